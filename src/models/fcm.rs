use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ProviderError, ProviderErrorCode},
    models::notification::NotificationPayload,
};

#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AndroidConfig {
    pub priority: &'static str,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, Serialize)]
pub struct AndroidNotification {
    pub sound: &'static str,
    pub channel_id: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_options: Option<ApnsFcmOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, Serialize)]
pub struct Aps {
    pub sound: &'static str,
    pub badge: u32,

    #[serde(rename = "mutable-content", skip_serializing_if = "Option::is_none")]
    pub mutable_content: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApnsFcmOptions {
    pub image: String,
}

impl FcmMessage {
    pub fn for_token(token: &str, payload: &NotificationPayload) -> Self {
        let image = payload.image_url.clone();

        Self {
            token: token.to_string(),
            notification: FcmNotification {
                title: payload.title.clone(),
                body: payload.body.clone(),
                image: image.clone(),
            },
            data: payload.data.clone(),
            android: AndroidConfig {
                priority: "high",
                notification: AndroidNotification {
                    sound: "default",
                    channel_id: "default",
                },
            },
            apns: ApnsConfig {
                payload: ApnsPayload {
                    aps: Aps {
                        sound: "default",
                        badge: payload.badge_count.unwrap_or(1),
                        mutable_content: image.as_ref().map(|_| 1),
                    },
                },
                fcm_options: image.map(|image| ApnsFcmOptions { image }),
            },
        }
    }
}

/// Successful send: `name` is `projects/{project}/messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FcmSendResponse {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorResponse {
    pub error: FcmErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorDetail {
    #[serde(rename = "@type", default)]
    pub type_url: String,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

impl FcmErrorBody {
    /// Maps an FCM v1 error onto the provider taxonomy.
    pub fn classify(&self) -> ProviderErrorCode {
        let fcm_code = self
            .details
            .iter()
            .filter(|d| d.type_url.ends_with("FcmError"))
            .find_map(|d| d.error_code.as_deref())
            .unwrap_or(self.status.as_str());

        match fcm_code {
            "UNREGISTERED" | "NOT_FOUND" => ProviderErrorCode::RegistrationTokenNotRegistered,
            "INVALID_ARGUMENT" => {
                if self.message.to_lowercase().contains("registration token") {
                    ProviderErrorCode::InvalidRegistrationToken
                } else {
                    ProviderErrorCode::InvalidArgument
                }
            }
            "QUOTA_EXCEEDED" | "RESOURCE_EXHAUSTED" => ProviderErrorCode::QuotaExceeded,
            "UNAVAILABLE" => ProviderErrorCode::Unavailable,
            "INTERNAL" => ProviderErrorCode::Internal,
            "SENDER_ID_MISMATCH" => ProviderErrorCode::SenderIdMismatch,
            "THIRD_PARTY_AUTH_ERROR" => ProviderErrorCode::ThirdPartyAuth,
            "UNAUTHENTICATED" | "PERMISSION_DENIED" => ProviderErrorCode::Authentication,
            _ => ProviderErrorCode::Unknown,
        }
    }

    pub fn into_provider_error(self) -> ProviderError {
        let code = self.classify();
        ProviderError::new(code, self.message)
    }
}
