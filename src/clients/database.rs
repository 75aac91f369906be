use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::{
    FromRow, PgPool, Postgres, QueryBuilder,
    postgres::PgPoolOptions,
    types::Json,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{
        audit::CreateDeliveryLog,
        campaign::{Campaign, CampaignCounters, CampaignListQuery, CampaignPatch, CampaignStatus},
        filter::AudienceFilter,
        food::{DeletedFood, NewFoodAnalysis},
        profile::{ProfilePatch, ProfileUpsert, UserProfile},
        recipient::Recipient,
    },
    store::{CampaignStore, DeliveryStore, FoodStore, ProfileStore, RecipientStore, StoreResult},
};

/// Rows per INSERT statement; 8 binds per row keeps well under the 65535 parameter cap.
const AUDIT_INSERT_CHUNK: usize = 1000;

const CAMPAIGN_COLUMNS: &str = "id, campaign_name, title, body, data, filter_criteria, status, \
     scheduled_at, sent_at, created_at, created_by, total_recipients, successful_sends, failed_sends";

const PROFILE_COLUMNS: &str = "user_id, email, display_name, photo_url, gender, age, weight, \
     height, activity_level, goal, daily_calories, bmi, theme_preference, ai_provider, \
     measurement_unit, fcm_token, notifications_enabled, is_premium, created_at, updated_at";

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct CampaignRow {
    id: Uuid,
    campaign_name: String,
    title: String,
    body: String,
    data: Option<Json<JsonValue>>,
    filter_criteria: Option<Json<JsonValue>>,
    status: String,
    scheduled_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    total_recipients: Option<i32>,
    successful_sends: Option<i32>,
    failed_sends: Option<i32>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = StoreError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let decode = |reason: String| StoreError::Decode {
            entity: "campaign",
            reason,
        };

        let data = match row.data.map(|Json(value)| value) {
            None | Some(JsonValue::Null) => Map::new(),
            Some(JsonValue::Object(map)) => map,
            Some(other) => return Err(decode(format!("data is not an object: {}", other))),
        };
        let filter_criteria = match row.filter_criteria.map(|Json(value)| value) {
            None | Some(JsonValue::Null) => AudienceFilter::All,
            Some(value) => serde_json::from_value(value)
                .map_err(|e| decode(format!("filter_criteria: {}", e)))?,
        };
        let status = row
            .status
            .parse::<CampaignStatus>()
            .map_err(|e| decode(e.to_string()))?;

        Ok(Campaign {
            id: row.id,
            campaign_name: row.campaign_name,
            title: row.title,
            body: row.body,
            data,
            filter_criteria,
            status,
            scheduled_at: row.scheduled_at,
            sent_at: row.sent_at,
            created_at: row.created_at,
            created_by: row.created_by.unwrap_or_else(|| "system".to_string()),
            total_recipients: row.total_recipients,
            successful_sends: row.successful_sends,
            failed_sends: row.failed_sends,
        })
    }
}

fn into_campaigns(rows: Vec<CampaignRow>) -> StoreResult<Vec<Campaign>> {
    rows.into_iter().map(Campaign::try_from).collect()
}

/// Builds the recipient query for an already validated filter.
fn recipient_query(filter: &AudienceFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT user_id, fcm_token, email, display_name FROM users \
         WHERE notifications_enabled = true AND fcm_token IS NOT NULL AND fcm_token <> ''",
    );

    match filter {
        AudienceFilter::All => {}
        AudienceFilter::Premium => {
            qb.push(" AND is_premium = true");
        }
        AudienceFilter::AgeRange { min_age, max_age } => {
            if let Some(min) = min_age {
                qb.push(" AND age >= ").push_bind(*min);
            }
            if let Some(max) = max_age {
                qb.push(" AND age <= ").push_bind(*max);
            }
        }
        AudienceFilter::ByIds { user_ids } => {
            qb.push(" AND user_id = ANY(")
                .push_bind(user_ids.clone())
                .push(")");
        }
        AudienceFilter::Custom { where_clause } => {
            qb.push(" AND (").push(where_clause).push(")");
        }
    }

    qb.push(" ORDER BY user_id");
    qb
}

macro_rules! assign_present {
    ($set:expr, $patch:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if let Some(value) = &$patch.$field {
                $set.push(concat!(stringify!($field), " = "))
                    .push_bind_unseparated(value.clone());
            }
        )+
    };
}

fn profile_update_query(user_id: &str, patch: &ProfilePatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE users SET ");
    {
        let mut set = qb.separated(", ");
        assign_present!(
            set,
            patch,
            [
                email,
                display_name,
                photo_url,
                gender,
                age,
                weight,
                height,
                activity_level,
                goal,
                daily_calories,
                bmi,
                theme_preference,
                ai_provider,
                measurement_unit,
                notifications_enabled,
                is_premium,
            ]
        );
        match patch.fcm_token.as_deref() {
            Some("") => {
                set.push("fcm_token = NULL");
            }
            Some(token) => {
                set.push("fcm_token = ")
                    .push_bind_unseparated(token.to_string());
            }
            None => {}
        }
        set.push("updated_at = NOW()");
    }
    qb.push(" WHERE user_id = ")
        .push_bind(user_id.to_string())
        .push(" RETURNING ")
        .push(PROFILE_COLUMNS);
    qb
}

fn campaign_update_query(id: Uuid, patch: &CampaignPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE notification_campaigns SET ");
    {
        let mut set = qb.separated(", ");
        assign_present!(set, patch, [campaign_name, title, body, scheduled_at]);
        if let Some(data) = &patch.data {
            set.push("data = ").push_bind_unseparated(Json(data.clone()));
        }
        if let Some(filter) = &patch.filter_criteria {
            set.push("filter_criteria = ")
                .push_bind_unseparated(Json(filter.clone()));
        }
        if let Some(status) = patch.status {
            set.push("status = ")
                .push_bind_unseparated(status.as_str().to_string());
        }
    }
    qb.push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(CAMPAIGN_COLUMNS);
    qb
}

#[async_trait]
impl RecipientStore for DatabaseClient {
    async fn query_recipients(&self, filter: &AudienceFilter) -> StoreResult<Vec<Recipient>> {
        let mut qb = recipient_query(filter);

        debug!(filter_type = filter.kind(), sql = qb.sql(), "Querying recipients");

        let recipients = qb
            .build_query_as::<Recipient>()
            .fetch_all(&self.pool)
            .await?;
        Ok(recipients)
    }
}

#[async_trait]
impl DeliveryStore for DatabaseClient {
    async fn insert_delivery_logs(&self, logs: &[CreateDeliveryLog]) -> StoreResult<u64> {
        if logs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in logs.chunks(AUDIT_INSERT_CHUNK) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO notifications_log \
                 (user_id, notification_type, campaign_id, title, body, data, status, error_message) ",
            );
            qb.push_values(chunk, |mut row, log| {
                row.push_bind(log.user_id.clone())
                    .push_bind(log.notification_type.clone())
                    .push_bind(log.campaign_id)
                    .push_bind(log.title.clone())
                    .push_bind(log.body.clone())
                    .push_bind(Json(log.data.clone()))
                    .push_bind(log.status.to_string())
                    .push_bind(log.error_message.clone());
            });

            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit delivery log batch");
            StoreError::from(e)
        })?;

        debug!(rows = written, "Delivery logs written to database");
        Ok(written)
    }

    async fn clear_device_tokens(&self, tokens: &[String]) -> StoreResult<u64> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE users SET fcm_token = NULL, updated_at = NOW() WHERE fcm_token = ANY($1)",
        )
        .bind(tokens)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CampaignStore for DatabaseClient {
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<Campaign> {
        let sql = format!(
            "INSERT INTO notification_campaigns \
             (id, campaign_name, title, body, data, filter_criteria, scheduled_at, status, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        let row = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(campaign.id)
            .bind(&campaign.campaign_name)
            .bind(&campaign.title)
            .bind(&campaign.body)
            .bind(Json(&campaign.data))
            .bind(Json(&campaign.filter_criteria))
            .bind(campaign.scheduled_at)
            .bind(campaign.status.as_str())
            .bind(&campaign.created_by)
            .bind(campaign.created_at)
            .fetch_one(&self.pool)
            .await?;

        Campaign::try_from(row)
    }

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        let sql = format!(
            "SELECT {} FROM notification_campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn list_campaigns(&self, query: &CampaignListQuery) -> StoreResult<(Vec<Campaign>, u64)> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CAMPAIGN_COLUMNS).push(" FROM notification_campaigns");
        if let Some(status) = query.status {
            qb.push(" WHERE status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = qb
            .build_query_as::<CampaignRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notification_campaigns");
        if let Some(status) = query.status {
            count.push(" WHERE status = ").push_bind(status.as_str());
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((into_campaigns(rows)?, total.max(0) as u64))
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>> {
        let mut qb = campaign_update_query(id, patch);

        qb.build_query_as::<CampaignRow>()
            .fetch_optional(&self.pool)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn delete_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        let sql = format!(
            "DELETE FROM notification_campaigns WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        );

        sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn mark_sending(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE notification_campaigns SET status = 'sending', sent_at = $2 WHERE id = $1")
            .bind(id)
            .bind(sent_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, counters: CampaignCounters) -> StoreResult<()> {
        sqlx::query(
            "UPDATE notification_campaigns \
             SET status = 'sent', total_recipients = $2, successful_sends = $3, failed_sends = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(counters.total_recipients as i32)
        .bind(counters.successful_sends as i32)
        .bind(counters.failed_sends as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> StoreResult<()> {
        sqlx::query("UPDATE notification_campaigns SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn due_campaigns(&self, now: DateTime<Utc>) -> StoreResult<Vec<Campaign>> {
        let sql = format!(
            "SELECT {} FROM notification_campaigns \
             WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= $1 \
             ORDER BY scheduled_at ASC",
            CAMPAIGN_COLUMNS
        );

        let rows = sqlx::query_as::<_, CampaignRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        into_campaigns(rows)
    }
}

#[async_trait]
impl ProfileStore for DatabaseClient {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM users WHERE user_id = $1", PROFILE_COLUMNS);

        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> StoreResult<UserProfile> {
        let sql = format!(
            "INSERT INTO users (\
                user_id, email, display_name, photo_url, gender, age, weight, height, \
                activity_level, goal, daily_calories, bmi, theme_preference, ai_provider, \
                measurement_unit, created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET \
                email = EXCLUDED.email, \
                display_name = EXCLUDED.display_name, \
                photo_url = EXCLUDED.photo_url, \
                gender = EXCLUDED.gender, \
                age = EXCLUDED.age, \
                weight = EXCLUDED.weight, \
                height = EXCLUDED.height, \
                activity_level = EXCLUDED.activity_level, \
                goal = EXCLUDED.goal, \
                daily_calories = EXCLUDED.daily_calories, \
                bmi = EXCLUDED.bmi, \
                theme_preference = EXCLUDED.theme_preference, \
                ai_provider = EXCLUDED.ai_provider, \
                measurement_unit = EXCLUDED.measurement_unit, \
                updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            PROFILE_COLUMNS
        );

        let saved = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(&profile.user_id)
            .bind(&profile.email)
            .bind(&profile.display_name)
            .bind(&profile.photo_url)
            .bind(&profile.gender)
            .bind(profile.age)
            .bind(profile.weight)
            .bind(profile.height)
            .bind(&profile.activity_level)
            .bind(&profile.goal)
            .bind(profile.daily_calories)
            .bind(profile.bmi)
            .bind(&profile.theme_preference)
            .bind(&profile.ai_provider)
            .bind(&profile.measurement_unit)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    async fn patch_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<Option<UserProfile>> {
        let mut qb = profile_update_query(user_id, patch);

        let profile = qb
            .build_query_as::<UserProfile>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }
}

#[async_trait]
impl FoodStore for DatabaseClient {
    async fn insert_food(&self, food: &NewFoodAnalysis) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO foods \
             (user_id, image_url, food_name, calories, protein, carbs, fat, health_score, analysis_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(&food.user_id)
        .bind(&food.image_url)
        .bind(&food.food_name)
        .bind(food.calories)
        .bind(food.protein)
        .bind(food.carbs)
        .bind(food.fat)
        .bind(food.health_score)
        .bind(food.analysis_date.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_foods(
        &self,
        user_id: &str,
        food_id: Option<i64>,
    ) -> StoreResult<Vec<DeletedFood>> {
        let deleted = match food_id {
            Some(food_id) => {
                sqlx::query_as::<_, DeletedFood>(
                    "DELETE FROM foods WHERE id = $1 AND user_id = $2 \
                     RETURNING id, food_name, user_id",
                )
                .bind(food_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DeletedFood>(
                    "DELETE FROM foods WHERE user_id = $1 RETURNING id, food_name, user_id",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(deleted)
    }
}
