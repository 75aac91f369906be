use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    clients::health::HealthChecker,
    error::ServiceError,
    models::{
        campaign::{Campaign, CampaignListQuery, CampaignPatch, NewCampaign},
        food::{DeletedFood, NewFoodAnalysis},
        health::HealthStatus,
        notification::{SendNotificationRequest, SendSummary},
        profile::{ProfilePatch, ProfileUpsert, UserProfile},
        response::{ApiResponse, PaginationMeta},
        status::DeliverySource,
    },
    services::{
        fanout::NotificationFanOut,
        food::FoodService,
        orchestrator::CampaignOrchestrator,
        profile::ProfileService,
        scheduler::{CampaignScheduler, SweepReport},
    },
};

pub struct AppState {
    pub health_checker: HealthChecker,
    pub fanout: Arc<NotificationFanOut>,
    pub campaigns: Arc<CampaignOrchestrator>,
    pub scheduler: Arc<CampaignScheduler>,
    pub profiles: ProfileService,
    pub foods: FoodService,
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

fn ok<T>(data: T, message: &str) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data, message))))
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let message = match &self {
            ServiceError::InvalidTransition { from, allowed, .. } if allowed.is_empty() => {
                format!("Valid transitions from '{}': none", from)
            }
            ServiceError::InvalidTransition { from, allowed, .. } => format!(
                "Valid transitions from '{}': {}",
                from,
                allowed
                    .iter()
                    .map(|status| status.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ServiceError::CampaignImmutable(_) => {
                "Sent campaigns are immutable and cannot be modified".to_string()
            }
            _ if status.is_server_error() => "Internal server error".to_string(),
            _ => "Request rejected".to_string(),
        };

        (
            status,
            Json(ApiResponse::<()>::error(self.to_string(), message)),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/notifications/send", post(send_notification))
        .route("/campaigns", post(create_campaign).get(list_campaigns))
        .route("/campaigns/sweep", post(sweep_campaigns))
        .route(
            "/campaigns/{id}",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/{id}/send", post(send_campaign))
        .route(
            "/users/{id}",
            get(get_user).put(put_user).patch(patch_user),
        )
        .route("/foods", post(create_food))
        .route("/users/{id}/foods", delete(delete_user_foods))
        .route("/users/{id}/foods/{food_id}", delete(delete_user_food))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(state: Arc<AppState>, port: u16) -> Result<(), Error> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Campaign service listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendNotificationRequest>,
) -> ApiResult<SendSummary> {
    let payload = request.payload()?;
    let source = request
        .campaign_id
        .map(DeliverySource::Campaign)
        .unwrap_or(DeliverySource::Manual);

    let summary = state.fanout.deliver(&request.filter, &payload, source).await?;

    let message = if summary.total_recipients == 0 {
        "No users found matching the filter criteria"
    } else {
        "Notifications sent"
    };
    ok(summary, message)
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewCampaign>,
) -> ApiResult<Campaign> {
    let campaign = state.campaigns.create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(campaign, "Campaign created successfully")),
    ))
}

async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CampaignListQuery>,
) -> ApiResult<Vec<Campaign>> {
    let page = state.campaigns.list(query).await?;
    let meta = PaginationMeta::new(page.total, page.limit, page.offset);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(page.campaigns, "Campaigns retrieved").with_meta(meta)),
    ))
}

async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    ok(state.campaigns.get(id).await?, "Campaign retrieved")
}

async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CampaignPatch>,
) -> ApiResult<Campaign> {
    ok(
        state.campaigns.update(id, patch).await?,
        "Campaign updated successfully",
    )
}

async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    ok(
        state.campaigns.delete(id).await?,
        "Campaign deleted successfully",
    )
}

async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SendSummary> {
    let summary = state.campaigns.send(id).await?;

    let message = if summary.total_recipients == 0 {
        "No users found matching the filter criteria"
    } else {
        "Campaign sent"
    };
    ok(summary, message)
}

async fn sweep_campaigns(State(state): State<Arc<AppState>>) -> ApiResult<SweepReport> {
    let report = state.scheduler.sweep(Utc::now()).await?;
    let message = format!("Processed {} campaigns", report.due_campaigns);
    ok(report, &message)
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<UserProfile> {
    ok(state.profiles.get(&user_id).await?, "User profile retrieved")
}

async fn put_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(mut profile): Json<ProfileUpsert>,
) -> ApiResult<UserProfile> {
    profile.user_id = user_id;
    ok(state.profiles.upsert(profile).await?, "User profile saved")
}

async fn patch_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<UserProfile> {
    ok(
        state.profiles.patch(&user_id, patch).await?,
        "User profile updated",
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFood {
    food_id: i64,
}

async fn create_food(
    State(state): State<Arc<AppState>>,
    Json(food): Json<NewFoodAnalysis>,
) -> ApiResult<CreatedFood> {
    let food_id = state.foods.create(food).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            CreatedFood { food_id },
            "Food analysis saved",
        )),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedFoods {
    deleted_count: usize,
    deleted_records: Vec<DeletedFood>,
}

fn deleted_foods(deleted: Vec<DeletedFood>) -> ApiResult<DeletedFoods> {
    let message = if deleted.is_empty() {
        "No food records found to delete".to_string()
    } else {
        format!("Successfully deleted {} food record(s)", deleted.len())
    };

    ok(
        DeletedFoods {
            deleted_count: deleted.len(),
            deleted_records: deleted,
        },
        &message,
    )
}

async fn delete_user_foods(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<DeletedFoods> {
    deleted_foods(state.foods.delete(&user_id, None).await?)
}

async fn delete_user_food(
    State(state): State<Arc<AppState>>,
    Path((user_id, food_id)): Path<(String, i64)>,
) -> ApiResult<DeletedFoods> {
    deleted_foods(state.foods.delete(&user_id, Some(food_id)).await?)
}
