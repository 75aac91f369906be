use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ServiceError},
    models::validation::validate_fcm_token,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub daily_calories: Option<i32>,
    pub bmi: Option<f64>,
    pub theme_preference: Option<String>,
    pub ai_provider: Option<String>,
    pub measurement_unit: Option<String>,
    pub fcm_token: Option<String>,
    pub notifications_enabled: bool,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full profile as saved by the app; overwrites every descriptive field on conflict.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpsert {
    #[serde(default)]
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub daily_calories: Option<i32>,
    pub bmi: Option<f64>,
    pub theme_preference: Option<String>,
    pub ai_provider: Option<String>,
    pub measurement_unit: Option<String>,
}

impl ProfileUpsert {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(ServiceError::Validation("userId is required".to_string()));
        }
        if let Some(age) = self.age.filter(|age| !(0..=150).contains(age)) {
            return Err(ServiceError::Validation(format!("age out of range: {age}")));
        }
        Ok(())
    }
}

/// Field-by-field profile update; only present fields become SET clauses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity_level: Option<String>,
    pub goal: Option<String>,
    pub daily_calories: Option<i32>,
    pub bmi: Option<f64>,
    pub theme_preference: Option<String>,
    pub ai_provider: Option<String>,
    pub measurement_unit: Option<String>,
    /// An empty string clears the stored token.
    pub fcm_token: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub is_premium: Option<bool>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == ProfilePatch::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ServiceError::Validation("No fields to update".to_string()));
        }
        if let Some(token) = self.fcm_token.as_deref().filter(|t| !t.is_empty()) {
            validate_fcm_token(token)
                .map_err(|e| ServiceError::Validation(format!("Invalid device token: {e}")))?;
        }
        if let Some(age) = self.age.filter(|age| !(0..=150).contains(age)) {
            return Err(ServiceError::Validation(format!("age out of range: {age}")));
        }
        Ok(())
    }
}
