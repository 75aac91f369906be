use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    models::{
        audit::{CreateDeliveryLog, RecipientOutcome},
        notification::NotificationPayload,
        status::DeliverySource,
    },
    store::DeliveryStore,
};

/// Best-effort audit trail and token hygiene. Neither operation ever fails its caller.
pub struct DeliveryRecorder {
    store: Arc<dyn DeliveryStore>,
}

impl DeliveryRecorder {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Writes one audit row per outcome and returns the rows written (0 on failure).
    pub async fn record(
        &self,
        outcomes: &[RecipientOutcome],
        payload: &NotificationPayload,
        source: DeliverySource,
    ) -> u64 {
        if outcomes.is_empty() {
            return 0;
        }

        let logs: Vec<CreateDeliveryLog> = outcomes
            .iter()
            .map(|outcome| {
                let log =
                    CreateDeliveryLog::new(outcome.user_id.clone(), payload, source, outcome.status);
                match &outcome.error_message {
                    Some(error) => log.with_error(error.clone()),
                    None => log,
                }
            })
            .collect();

        match self.store.insert_delivery_logs(&logs).await {
            Ok(written) => {
                debug!(
                    rows = written,
                    notification_type = source.notification_type(),
                    "Delivery logs recorded"
                );
                written
            }
            Err(e) => {
                warn!(
                    rows = logs.len(),
                    notification_type = source.notification_type(),
                    error = %e,
                    "Failed to record delivery logs"
                );
                0
            }
        }
    }

    /// Clears every user's token found in `tokens`; returns how many were actually cleared.
    pub async fn purge_invalid_tokens(&self, tokens: &BTreeSet<String>) -> u64 {
        if tokens.is_empty() {
            return 0;
        }

        let tokens: Vec<String> = tokens.iter().cloned().collect();
        match self.store.clear_device_tokens(&tokens).await {
            Ok(cleared) => {
                info!(
                    requested = tokens.len(),
                    cleared, "Invalid device tokens purged"
                );
                cleared
            }
            Err(e) => {
                warn!(requested = tokens.len(), error = %e, "Failed to purge invalid tokens");
                0
            }
        }
    }
}
