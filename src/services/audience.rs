use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{Result, ServiceError},
    models::{filter::AudienceFilter, recipient::Recipient},
    store::RecipientStore,
};

/// Turns an audience filter into the users currently holding a device token.
pub struct AudienceResolver {
    store: Arc<dyn RecipientStore>,
    allow_custom: bool,
}

impl AudienceResolver {
    pub fn new(store: Arc<dyn RecipientStore>, allow_custom: bool) -> Self {
        Self {
            store,
            allow_custom,
        }
    }

    pub async fn resolve(&self, filter: &AudienceFilter) -> Result<Vec<Recipient>> {
        if matches!(filter, AudienceFilter::Custom { .. }) && !self.allow_custom {
            warn!("Rejected custom audience predicate; custom filters are disabled");
            return Err(ServiceError::UntrustedPredicate);
        }
        filter.validate()?;

        let recipients = self.store.query_recipients(filter).await?;

        info!(
            filter_type = filter.kind(),
            recipients = recipients.len(),
            "Audience resolved"
        );

        Ok(recipients)
    }
}
