use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    notification::NotificationPayload,
    status::{DeliverySource, DeliveryStatus},
};

#[derive(Debug, Clone, Serialize)]
pub struct CreateDeliveryLog {
    pub user_id: String,
    pub notification_type: String,
    pub campaign_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}

impl CreateDeliveryLog {
    pub fn new(
        user_id: String,
        payload: &NotificationPayload,
        source: DeliverySource,
        status: DeliveryStatus,
    ) -> Self {
        Self {
            user_id,
            notification_type: source.notification_type().to_string(),
            campaign_id: source.campaign_id(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            data: payload.data.clone(),
            status,
            error_message: None,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_message = Some(error);
        self
    }
}

/// Per-recipient outcome handed to the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub user_id: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}
