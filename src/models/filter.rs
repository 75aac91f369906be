use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Declarative audience selection, tagged by `type` on the wire.
///
/// ```json
/// { "type": "age", "minAge": 18, "maxAge": 35 }
/// { "type": "userIds", "userIds": ["u1", "u2"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AudienceFilter {
    #[default]
    All,
    Premium,
    #[serde(rename = "age")]
    AgeRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_age: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_age: Option<i32>,
    },
    #[serde(rename = "userIds")]
    ByIds {
        #[serde(default)]
        user_ids: Vec<String>,
    },
    /// Raw SQL boolean expression evaluated by the store. Trusted callers only.
    Custom {
        #[serde(default)]
        where_clause: String,
    },
}

impl AudienceFilter {
    pub fn kind(&self) -> &'static str {
        match self {
            AudienceFilter::All => "all",
            AudienceFilter::Premium => "premium",
            AudienceFilter::AgeRange { .. } => "age",
            AudienceFilter::ByIds { .. } => "userIds",
            AudienceFilter::Custom { .. } => "custom",
        }
    }

    /// Structural checks only; a custom predicate is checked for presence, never for content.
    pub fn validate(&self) -> Result<()> {
        match self {
            AudienceFilter::All | AudienceFilter::Premium => Ok(()),
            AudienceFilter::AgeRange { min_age, max_age } => match (min_age, max_age) {
                (None, None) => Err(ServiceError::InvalidFilter(
                    "For age filter, provide minAge and/or maxAge".to_string(),
                )),
                (Some(min), Some(max)) if min > max => Err(ServiceError::InvalidFilter(format!(
                    "minAge ({min}) must not exceed maxAge ({max})"
                ))),
                _ => Ok(()),
            },
            AudienceFilter::ByIds { user_ids } => {
                if user_ids.is_empty() {
                    return Err(ServiceError::InvalidFilter(
                        "userIds array is required and must not be empty".to_string(),
                    ));
                }
                if user_ids.iter().any(|id| id.trim().is_empty()) {
                    return Err(ServiceError::InvalidFilter(
                        "userIds must not contain empty ids".to_string(),
                    ));
                }
                Ok(())
            }
            AudienceFilter::Custom { where_clause } => {
                if where_clause.trim().is_empty() {
                    return Err(ServiceError::InvalidFilter(
                        "whereClause is required for custom filter".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
