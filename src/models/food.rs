use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFoodAnalysis {
    #[serde(default)]
    pub user_id: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub food_name: String,
    pub calories: Option<i32>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub health_score: Option<i32>,
    #[serde(default)]
    pub analysis_date: Option<DateTime<Utc>>,
}

impl NewFoodAnalysis {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() || self.food_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "userId and foodName are required".to_string(),
            ));
        }
        if self.calories.is_some_and(|c| c < 0) {
            return Err(ServiceError::Validation(
                "calories must not be negative".to_string(),
            ));
        }
        if let Some(score) = self.health_score.filter(|s| !(0..=100).contains(s)) {
            return Err(ServiceError::Validation(format!(
                "healthScore must be between 0 and 100, got {score}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeletedFood {
    pub id: i64,
    pub food_name: String,
    pub user_id: String,
}
