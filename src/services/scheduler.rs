use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::Result,
    models::notification::SendSummary,
    services::orchestrator::CampaignOrchestrator,
    store::CampaignStore,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SendSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub checked_at: DateTime<Utc>,
    pub due_campaigns: usize,
    pub results: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|entry| !entry.success).count()
    }
}

/// Sends every scheduled campaign that has come due.
pub struct CampaignScheduler {
    store: Arc<dyn CampaignStore>,
    orchestrator: Arc<CampaignOrchestrator>,
}

impl CampaignScheduler {
    pub fn new(store: Arc<dyn CampaignStore>, orchestrator: Arc<CampaignOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// One pass over due campaigns. A failing campaign is reported in its entry and the pass
    /// moves on; only the due-campaign query itself can fail the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self.store.due_campaigns(now).await?;

        if due.is_empty() {
            info!(checked_at = %now, "No campaigns due for sending");
        } else {
            info!(checked_at = %now, due = due.len(), "Sending due campaigns");
        }

        let mut results = Vec::with_capacity(due.len());
        for campaign in &due {
            let entry = match self.orchestrator.send(campaign.id).await {
                Ok(summary) => SweepEntry {
                    campaign_id: campaign.id,
                    campaign_name: campaign.campaign_name.clone(),
                    success: true,
                    result: Some(summary),
                    error: None,
                },
                Err(e) => {
                    error!(campaign_id = %campaign.id, error = %e, "Scheduled campaign failed");
                    SweepEntry {
                        campaign_id: campaign.id,
                        campaign_name: campaign.campaign_name.clone(),
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(entry);
        }

        let report = SweepReport {
            checked_at: now,
            due_campaigns: due.len(),
            results,
        };

        if report.due_campaigns > 0 {
            info!(
                due = report.due_campaigns,
                failed = report.failures(),
                "Campaign sweep completed"
            );
        }

        Ok(report)
    }

    /// Runs a sweep on its own task and waits for it. Passing `deadline` is logged as an
    /// error but the sweep keeps running: a campaign already dispatching finishes its chunks,
    /// audit rows and token purge before this returns.
    pub async fn sweep_with_deadline(
        self: &Arc<Self>,
        now: DateTime<Utc>,
        deadline: Duration,
    ) -> anyhow::Result<SweepReport> {
        let scheduler = self.clone();
        let mut handle = tokio::spawn(async move { scheduler.sweep(now).await });

        let joined = match timeout(deadline, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                error!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Campaign sweep exceeded its deadline; waiting for in-flight sends"
                );
                handle.await
            }
        };

        Ok(joined??)
    }
}
