//! Error taxonomy for the notification fan-out service.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::models::campaign::CampaignStatus;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed audience specification supplied by the caller.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A custom predicate reached the resolver while custom filters are disabled.
    ///
    /// Custom predicates are spliced into the recipient query verbatim, so they are only
    /// accepted from trusted callers. This variant marks that boundary; the predicate itself
    /// is never inspected.
    #[error("Custom filter predicates are restricted to trusted callers")]
    UntrustedPredicate,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "Invalid status transition from '{from}' to '{to}', allowed: {}",
        StatusList(.allowed)
    )]
    InvalidTransition {
        from: String,
        to: CampaignStatus,
        allowed: Vec<CampaignStatus>,
    },

    #[error("Campaign {0} cannot be modified")]
    CampaignImmutable(Uuid),

    #[error("Campaign {0} has already been sent")]
    AlreadySent(Uuid),

    #[error("Messaging provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidFilter(_)
            | ServiceError::Validation(_)
            | ServiceError::InvalidTransition { .. }
            | ServiceError::CampaignImmutable(_) => StatusCode::BAD_REQUEST,
            ServiceError::UntrustedPredicate => StatusCode::FORBIDDEN,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::AlreadySent(_) => StatusCode::CONFLICT,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

struct StatusList<'a>(&'a [CampaignStatus]);

impl Display for StatusList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.0.iter().map(CampaignStatus::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Error codes reported by the messaging provider, named after the FCM admin codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    RegistrationTokenNotRegistered,
    InvalidRegistrationToken,
    InvalidArgument,
    QuotaExceeded,
    Unavailable,
    Internal,
    SenderIdMismatch,
    ThirdPartyAuth,
    Authentication,
    Transport,
    Unknown,
}

impl ProviderErrorCode {
    /// True when the device token is permanently dead and should be purged.
    pub fn is_invalid_token(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::RegistrationTokenNotRegistered
                | ProviderErrorCode::InvalidRegistrationToken
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::RegistrationTokenNotRegistered => {
                "messaging/registration-token-not-registered"
            }
            ProviderErrorCode::InvalidRegistrationToken => "messaging/invalid-registration-token",
            ProviderErrorCode::InvalidArgument => "messaging/invalid-argument",
            ProviderErrorCode::QuotaExceeded => "messaging/quota-exceeded",
            ProviderErrorCode::Unavailable => "messaging/server-unavailable",
            ProviderErrorCode::Internal => "messaging/internal-error",
            ProviderErrorCode::SenderIdMismatch => "messaging/mismatched-credential",
            ProviderErrorCode::ThirdPartyAuth => "messaging/third-party-auth-error",
            ProviderErrorCode::Authentication => "messaging/authentication-error",
            ProviderErrorCode::Transport => "messaging/transport-error",
            ProviderErrorCode::Unknown => "messaging/unknown-error",
        }
    }
}

impl Display for ProviderErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        self.code.is_invalid_token()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt {entity} row: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error("store backend failure: {0}")]
    Backend(String),
}
