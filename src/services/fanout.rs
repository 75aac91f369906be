use tracing::info;

use crate::{
    error::Result,
    models::{
        audit::RecipientOutcome,
        dispatch::{DeliveryOutcome, TokenResult},
        filter::AudienceFilter,
        notification::{NotificationPayload, SendSummary},
        recipient::Recipient,
        status::{DeliverySource, DeliveryStatus},
    },
    services::{audience::AudienceResolver, dispatcher::MessageDispatcher, recorder::DeliveryRecorder},
};

/// Resolve, dispatch, record, purge. Shared by manual sends and campaigns.
pub struct NotificationFanOut {
    resolver: AudienceResolver,
    dispatcher: MessageDispatcher,
    recorder: DeliveryRecorder,
}

impl NotificationFanOut {
    pub fn new(
        resolver: AudienceResolver,
        dispatcher: MessageDispatcher,
        recorder: DeliveryRecorder,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            recorder,
        }
    }

    pub async fn deliver(
        &self,
        filter: &AudienceFilter,
        payload: &NotificationPayload,
        source: DeliverySource,
    ) -> Result<SendSummary> {
        let recipients = self.resolver.resolve(filter).await?;

        if recipients.is_empty() {
            info!(
                filter_type = filter.kind(),
                notification_type = source.notification_type(),
                "No recipients matched; nothing dispatched"
            );
            return Ok(SendSummary::default());
        }

        let tokens: Vec<String> = recipients
            .iter()
            .map(|recipient| recipient.device_token.clone())
            .collect();

        let aggregate = self.dispatcher.dispatch(&tokens, payload).await?;

        let outcomes: Vec<RecipientOutcome> = recipients
            .iter()
            .zip(&aggregate.results)
            .map(|(recipient, result)| outcome_for(recipient, result))
            .collect();

        self.recorder.record(&outcomes, payload, source).await;
        let invalid_tokens_cleared = self
            .recorder
            .purge_invalid_tokens(&aggregate.invalid_tokens)
            .await;

        let summary = SendSummary {
            sent_count: aggregate.sent_count,
            failed_count: aggregate.failed_count,
            total_recipients: recipients.len() as u32,
            invalid_tokens_cleared,
        };

        info!(
            notification_type = source.notification_type(),
            campaign_id = ?source.campaign_id(),
            total = summary.total_recipients,
            sent = summary.sent_count,
            failed = summary.failed_count,
            tokens_cleared = summary.invalid_tokens_cleared,
            "Notification fan-out completed"
        );

        Ok(summary)
    }
}

fn outcome_for(recipient: &Recipient, result: &TokenResult) -> RecipientOutcome {
    match &result.outcome {
        DeliveryOutcome::Sent => RecipientOutcome {
            user_id: recipient.user_id.clone(),
            status: DeliveryStatus::Sent,
            error_message: None,
        },
        DeliveryOutcome::Failed { reason, .. } => RecipientOutcome {
            user_id: recipient.user_id.clone(),
            status: DeliveryStatus::Failed,
            error_message: Some(reason.clone()),
        },
    }
}
