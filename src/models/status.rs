use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// What triggered a delivery; stored as the audit row's notification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    Manual,
    Campaign(Uuid),
}

impl DeliverySource {
    pub fn campaign_id(&self) -> Option<Uuid> {
        match self {
            DeliverySource::Manual => None,
            DeliverySource::Campaign(id) => Some(*id),
        }
    }

    pub fn notification_type(&self) -> &'static str {
        match self {
            DeliverySource::Manual => "manual",
            DeliverySource::Campaign(_) => "campaign",
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}
