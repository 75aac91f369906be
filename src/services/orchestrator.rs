use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{Result, ServiceError},
    models::{
        campaign::{
            Campaign, CampaignCounters, CampaignListQuery, CampaignPage, CampaignPatch,
            CampaignStatus, NewCampaign,
        },
        notification::{NotificationPayload, SendSummary},
        status::DeliverySource,
    },
    services::fanout::NotificationFanOut,
    store::CampaignStore,
};

pub const MAX_PAGE_SIZE: i64 = 200;

/// Owns the campaign lifecycle and drives a campaign send through the fan-out pipeline.
pub struct CampaignOrchestrator {
    store: Arc<dyn CampaignStore>,
    fanout: Arc<NotificationFanOut>,
}

impl CampaignOrchestrator {
    pub fn new(store: Arc<dyn CampaignStore>, fanout: Arc<NotificationFanOut>) -> Self {
        Self { store, fanout }
    }

    pub async fn create(&self, request: NewCampaign) -> Result<Campaign> {
        let campaign = request.into_campaign(Utc::now())?;
        let saved = self.store.insert_campaign(&campaign).await?;

        info!(
            campaign_id = %saved.id,
            status = %saved.status,
            filter_type = saved.filter_criteria.kind(),
            "Campaign created"
        );

        Ok(saved)
    }

    pub async fn get(&self, id: Uuid) -> Result<Campaign> {
        self.store
            .get_campaign(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("campaign", id))
    }

    pub async fn list(&self, mut query: CampaignListQuery) -> Result<CampaignPage> {
        query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        query.offset = query.offset.max(0);

        let (campaigns, total) = self.store.list_campaigns(&query).await?;

        Ok(CampaignPage {
            campaigns,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    pub async fn update(&self, id: Uuid, patch: CampaignPatch) -> Result<Campaign> {
        if patch.is_empty() {
            return Err(ServiceError::Validation("No fields to update".to_string()));
        }
        patch.validate()?;

        let current = self.get(id).await?;
        if let Some(next) = patch.status {
            current.status.check_transition(next)?;
        }
        if matches!(current.status, CampaignStatus::Sent | CampaignStatus::Sending) {
            return Err(ServiceError::CampaignImmutable(id));
        }

        let next_status = patch.status.unwrap_or(current.status);
        let next_schedule = match patch.scheduled_at {
            Some(value) => value,
            None => current.scheduled_at,
        };
        if next_status == CampaignStatus::Scheduled && next_schedule.is_none() {
            return Err(ServiceError::Validation(
                "scheduledAt is required for a scheduled campaign".to_string(),
            ));
        }

        let updated = self
            .store
            .update_campaign(id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("campaign", id))?;

        info!(campaign_id = %id, status = %updated.status, "Campaign updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Campaign> {
        let deleted = self
            .store
            .delete_campaign(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("campaign", id))?;

        info!(campaign_id = %id, status = %deleted.status, "Campaign deleted");
        Ok(deleted)
    }

    /// Sends a campaign to its audience.
    ///
    /// The campaign is marked `sending` before the audience is resolved. With no recipients it
    /// stays there and a zero summary is returned. Any hard failure after that point marks it
    /// `failed` and surfaces the original error.
    pub async fn send(&self, id: Uuid) -> Result<SendSummary> {
        let campaign = self.get(id).await?;
        if campaign.status == CampaignStatus::Sent {
            return Err(ServiceError::AlreadySent(id));
        }

        self.store.mark_sending(id, Utc::now()).await?;
        info!(
            campaign_id = %id,
            campaign_name = %campaign.campaign_name,
            previous_status = %campaign.status,
            "Campaign send started"
        );

        match self.deliver(&campaign).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(campaign_id = %id, error = %e, "Campaign send failed");
                if let Err(status_error) = self.store.set_status(id, CampaignStatus::Failed).await {
                    error!(
                        campaign_id = %id,
                        error = %status_error,
                        "Failed to mark campaign as failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn deliver(&self, campaign: &Campaign) -> Result<SendSummary> {
        let payload =
            NotificationPayload::new(&campaign.title, &campaign.body)?.with_data(&campaign.data);

        let summary = self
            .fanout
            .deliver(
                &campaign.filter_criteria,
                &payload,
                DeliverySource::Campaign(campaign.id),
            )
            .await?;

        if summary.total_recipients == 0 {
            warn!(
                campaign_id = %campaign.id,
                "Campaign matched no recipients; left in sending"
            );
            return Ok(summary);
        }

        self.store
            .mark_sent(campaign.id, CampaignCounters::from(&summary))
            .await?;

        info!(
            campaign_id = %campaign.id,
            total = summary.total_recipients,
            sent = summary.sent_count,
            failed = summary.failed_count,
            "Campaign sent"
        );

        Ok(summary)
    }
}
