use serde::{Deserialize, Serialize};

/// A user eligible for a push: notifications enabled and a non-empty device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub user_id: String,
    #[sqlx(rename = "fcm_token")]
    pub device_token: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}
