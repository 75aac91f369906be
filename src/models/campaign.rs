use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{
    error::{Result, ServiceError},
    models::{filter::AudienceFilter, notification::SendSummary},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Failed => "failed",
        }
    }

    /// Statuses a caller may move a campaign to from this one.
    ///
    /// `sending` and the `sending -> sent/failed` moves belong to the send operation itself,
    /// so they never appear here.
    pub fn allowed_transitions(&self) -> &'static [CampaignStatus] {
        match self {
            CampaignStatus::Draft => &[CampaignStatus::Scheduled],
            CampaignStatus::Scheduled => &[CampaignStatus::Draft, CampaignStatus::Sent],
            CampaignStatus::Sending => &[],
            CampaignStatus::Sent => &[],
            CampaignStatus::Failed => &[CampaignStatus::Draft, CampaignStatus::Scheduled],
        }
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn check_transition(&self, next: CampaignStatus) -> Result<()> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        Err(ServiceError::InvalidTransition {
            from: self.as_str().to_string(),
            to: next,
            allowed: self.allowed_transitions().to_vec(),
        })
    }
}

impl Display for CampaignStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "sent" => Ok(CampaignStatus::Sent),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(ServiceError::Validation(format!(
                "Unknown campaign status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub campaign_name: String,
    pub title: String,
    pub body: String,
    pub data: Map<String, JsonValue>,
    pub filter_criteria: AudienceFilter,
    pub status: CampaignStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub total_recipients: Option<i32>,
    pub successful_sends: Option<i32>,
    pub failed_sends: Option<i32>,
}

/// Creation request. Status is derived from `scheduledAt` unless given explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
    #[serde(default)]
    pub filter_criteria: AudienceFilter,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewCampaign {
    pub fn into_campaign(self, now: DateTime<Utc>) -> Result<Campaign> {
        if self.campaign_name.trim().is_empty()
            || self.title.trim().is_empty()
            || self.body.trim().is_empty()
        {
            return Err(ServiceError::Validation(
                "campaignName, title, and body are required".to_string(),
            ));
        }
        self.filter_criteria.validate()?;

        let derived = if self.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };
        let status = match self.status {
            None => derived,
            Some(status @ (CampaignStatus::Draft | CampaignStatus::Scheduled)) => status,
            Some(other) => {
                return Err(ServiceError::InvalidTransition {
                    from: "new".to_string(),
                    to: other,
                    allowed: vec![CampaignStatus::Draft, CampaignStatus::Scheduled],
                });
            }
        };
        if status == CampaignStatus::Scheduled && self.scheduled_at.is_none() {
            return Err(ServiceError::Validation(
                "scheduledAt is required for a scheduled campaign".to_string(),
            ));
        }

        Ok(Campaign {
            id: Uuid::new_v4(),
            campaign_name: self.campaign_name,
            title: self.title,
            body: self.body,
            data: self.data,
            filter_criteria: self.filter_criteria,
            status,
            scheduled_at: self.scheduled_at,
            sent_at: None,
            created_at: now,
            created_by: self.created_by.unwrap_or_else(|| "system".to_string()),
            total_recipients: None,
            successful_sends: None,
            failed_sends: None,
        })
    }
}

/// Partial update. Absent fields are left untouched; `scheduledAt: null` clears the schedule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, JsonValue>>,
    #[serde(default)]
    pub filter_criteria: Option<AudienceFilter>,
    #[serde(default, deserialize_with = "present")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
}

impl CampaignPatch {
    pub fn is_empty(&self) -> bool {
        *self == CampaignPatch::default()
    }

    pub fn validate(&self) -> Result<()> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&self.campaign_name) || blank(&self.title) || blank(&self.body) {
            return Err(ServiceError::Validation(
                "campaignName, title, and body cannot be blank".to_string(),
            ));
        }
        if let Some(filter) = &self.filter_criteria {
            filter.validate()?;
        }
        Ok(())
    }
}

/// Marks a field as present even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignCounters {
    pub total_recipients: u32,
    pub successful_sends: u32,
    pub failed_sends: u32,
}

impl From<&SendSummary> for CampaignCounters {
    fn from(summary: &SendSummary) -> Self {
        Self {
            total_recipients: summary.total_recipients,
            successful_sends: summary.sent_count,
            failed_sends: summary.failed_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignListQuery {
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for CampaignListQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPage {
    pub campaigns: Vec<Campaign>,
    pub total: u64,
    pub limit: i64,
    pub offset: i64,
}
