//! Persistence seams used by the fan-out core and the CRUD services.
//!
//! `DatabaseClient` implements every trait against PostgreSQL; tests substitute in-memory
//! stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
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
};

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Users matching `filter` that have notifications enabled and a non-empty token.
    ///
    /// The filter has already been validated. Every value is bound as a parameter; only the
    /// body of a `Custom` filter is spliced into the query text.
    async fn query_recipients(&self, filter: &AudienceFilter) -> StoreResult<Vec<Recipient>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Inserts all rows atomically, returning the number written.
    async fn insert_delivery_logs(&self, logs: &[CreateDeliveryLog]) -> StoreResult<u64>;

    /// Nulls the token of every user holding one of `tokens`; returns rows changed.
    async fn clear_device_tokens(&self, tokens: &[String]) -> StoreResult<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<Campaign>;

    async fn get_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>>;

    async fn list_campaigns(&self, query: &CampaignListQuery) -> StoreResult<(Vec<Campaign>, u64)>;

    async fn update_campaign(
        &self,
        id: Uuid,
        patch: &CampaignPatch,
    ) -> StoreResult<Option<Campaign>>;

    async fn delete_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>>;

    async fn mark_sending(&self, id: Uuid, sent_at: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_sent(&self, id: Uuid, counters: CampaignCounters) -> StoreResult<()>;

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> StoreResult<()>;

    /// Scheduled campaigns whose `scheduled_at` is at or before `now`, oldest first.
    async fn due_campaigns(&self, now: DateTime<Utc>) -> StoreResult<Vec<Campaign>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    async fn upsert_profile(&self, profile: &ProfileUpsert) -> StoreResult<UserProfile>;

    async fn patch_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<Option<UserProfile>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn insert_food(&self, food: &NewFoodAnalysis) -> StoreResult<i64>;

    /// Deletes one record when `food_id` is set, otherwise every record of the user.
    async fn delete_foods(
        &self,
        user_id: &str,
        food_id: Option<i64>,
    ) -> StoreResult<Vec<DeletedFood>>;
}
