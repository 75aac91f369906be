use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    clients::messaging::{MULTICAST_LIMIT, MessagingProvider},
    error::{ProviderError, ProviderErrorCode, Result},
    models::{
        dispatch::{DispatchAggregate, MulticastResponse, SendResponse},
        notification::NotificationPayload,
        validation::token_prefix,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub batch_size: usize,
    /// Pause between consecutive multicast chunks, never after the last one.
    pub batch_delay: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: MULTICAST_LIMIT,
            batch_delay: Duration::from_millis(100),
        }
    }
}

pub struct MessageDispatcher {
    provider: Arc<dyn MessagingProvider>,
    settings: DispatchSettings,
}

impl MessageDispatcher {
    pub fn new(provider: Arc<dyn MessagingProvider>, settings: DispatchSettings) -> Self {
        Self {
            provider,
            settings: DispatchSettings {
                batch_size: settings.batch_size.clamp(1, MULTICAST_LIMIT),
                ..settings
            },
        }
    }

    /// Sends `payload` to every token and returns per-token results in input order.
    ///
    /// A single token never yields `Err`: its provider failure becomes a failed result.
    /// With several tokens an `Err` means a whole chunk call failed.
    pub async fn dispatch(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<DispatchAggregate> {
        match tokens {
            [] => Ok(DispatchAggregate::default()),
            [token] => Ok(self.dispatch_single(token, payload).await),
            _ => self.dispatch_multicast(tokens, payload).await,
        }
    }

    async fn dispatch_single(&self, token: &String, payload: &NotificationPayload) -> DispatchAggregate {
        let response = match self.provider.send_one(token, payload).await {
            Ok(message_id) => SendResponse::delivered(message_id),
            Err(error) => {
                warn!(
                    token = token_prefix(token),
                    code = %error.code,
                    invalid_token = error.is_invalid_token(),
                    "Single send failed"
                );
                SendResponse::failed(error)
            }
        };

        let mut aggregate = DispatchAggregate::default();
        aggregate.absorb(
            std::slice::from_ref(token),
            &MulticastResponse::from_responses(vec![response]),
        );
        aggregate
    }

    async fn dispatch_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<DispatchAggregate> {
        let chunk_count = tokens.len().div_ceil(self.settings.batch_size);
        let mut aggregate = DispatchAggregate::default();

        for (index, chunk) in tokens.chunks(self.settings.batch_size).enumerate() {
            if index > 0 && !self.settings.batch_delay.is_zero() {
                sleep(self.settings.batch_delay).await;
            }

            let response = self
                .provider
                .send_multicast(chunk, payload)
                .await
                .inspect_err(|e| {
                    error!(
                        chunk = index + 1,
                        chunks = chunk_count,
                        error = %e,
                        "Multicast chunk failed"
                    )
                })?;

            if response.responses.len() != chunk.len() {
                return Err(ProviderError::new(
                    ProviderErrorCode::Unknown,
                    format!(
                        "provider returned {} results for {} tokens",
                        response.responses.len(),
                        chunk.len()
                    ),
                )
                .into());
            }

            debug!(
                chunk = index + 1,
                chunks = chunk_count,
                size = chunk.len(),
                success = response.success_count,
                failure = response.failure_count,
                "Multicast chunk dispatched"
            );

            aggregate.absorb(chunk, &response);
        }

        info!(
            tokens = tokens.len(),
            chunks = chunk_count,
            sent = aggregate.sent_count,
            failed = aggregate.failed_count,
            invalid_tokens = aggregate.invalid_tokens.len(),
            "Dispatch completed"
        );

        Ok(aggregate)
    }
}
