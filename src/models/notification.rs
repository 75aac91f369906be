use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{
    error::{Result, ServiceError},
    models::filter::AudienceFilter,
    utils::stringify_data,
};

/// A validated push notification: title and body are non-empty and every data value is a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub image_url: Option<String>,
    pub badge_count: Option<u32>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Result<Self> {
        let title = title.into();
        let body = body.into();

        if title.trim().is_empty() || body.trim().is_empty() {
            return Err(ServiceError::Validation(
                "notification.title and notification.body are required".to_string(),
            ));
        }

        Ok(Self {
            title,
            body,
            data: BTreeMap::new(),
            image_url: None,
            badge_count: None,
        })
    }

    /// Attaches a data payload, coercing every value to its string form.
    pub fn with_data(mut self, data: &Map<String, JsonValue>) -> Self {
        self.data = stringify_data(data);
        self
    }

    pub fn with_options(mut self, options: &SendOptions) -> Self {
        self.image_url = options.image_url.clone();
        self.badge_count = options.badge;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOptions {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub badge: Option<u32>,
}

/// Body of a manual send request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub filter: AudienceFilter,
    pub notification: NotificationContent,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
    #[serde(default)]
    pub options: SendOptions,
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
}

impl SendNotificationRequest {
    pub fn payload(&self) -> Result<NotificationPayload> {
        Ok(
            NotificationPayload::new(&self.notification.title, &self.notification.body)?
                .with_data(&self.data)
                .with_options(&self.options),
        )
    }
}

/// Counts reported back to the caller of a send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSummary {
    pub sent_count: u32,
    pub failed_count: u32,
    pub total_recipients: u32,
    pub invalid_tokens_cleared: u64,
}
