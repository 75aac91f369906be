use std::sync::Arc;

use tracing::info;

use crate::{
    error::{Result, ServiceError},
    models::profile::{ProfilePatch, ProfileUpsert, UserProfile},
    store::ProfileStore,
};

pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<UserProfile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    pub async fn upsert(&self, profile: ProfileUpsert) -> Result<UserProfile> {
        profile.validate()?;

        let saved = self.store.upsert_profile(&profile).await?;
        info!(user_id = %saved.user_id, "User profile saved");
        Ok(saved)
    }

    pub async fn patch(&self, user_id: &str, patch: ProfilePatch) -> Result<UserProfile> {
        patch.validate()?;

        let updated = self
            .store
            .patch_profile(user_id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))?;

        info!(
            user_id = %user_id,
            token_changed = patch.fcm_token.is_some(),
            notifications_enabled = updated.notifications_enabled,
            "User profile patched"
        );
        Ok(updated)
    }
}
