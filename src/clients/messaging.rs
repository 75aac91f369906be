use async_trait::async_trait;

use crate::{
    error::ProviderError,
    models::{dispatch::MulticastResponse, notification::NotificationPayload},
};

/// Provider ceiling on recipients per multicast call.
pub const MULTICAST_LIMIT: usize = 500;

/// Push provider seam. `FcmClient` is the production implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Sends to one device and returns the provider's message id.
    async fn send_one(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<String, ProviderError>;

    /// Sends to at most 500 devices in one logical call.
    ///
    /// Per-device failures are reported inside the response, index-aligned with `tokens`;
    /// an `Err` means the whole call failed.
    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<MulticastResponse, ProviderError>;
}
