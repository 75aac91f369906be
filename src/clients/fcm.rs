use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::future::join_all;
use gcp_auth::TokenProvider;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::{
    clients::messaging::{MULTICAST_LIMIT, MessagingProvider},
    config::Config,
    error::{ProviderError, ProviderErrorCode},
    models::{
        dispatch::{MulticastResponse, SendResponse},
        fcm::{FcmErrorResponse, FcmMessage, FcmRequest, FcmSendResponse},
        notification::NotificationPayload,
        validation::token_prefix,
    },
};

const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

pub enum FcmAuth {
    /// Google service-account credentials discovered from the environment.
    ServiceAccount(Arc<dyn TokenProvider>),
    /// Fixed bearer token, for emulators and tests.
    Static(String),
}

pub struct FcmClient {
    http_client: Client,
    base_url: String,
    fcm_project_id: String,
    auth: FcmAuth,
}

impl FcmClient {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| anyhow!("Failed to load FCM credentials: {}", e))?;

        info!(project_id = %config.fcm_project_id, "FCM client initialized");

        Ok(Self::with_auth(
            &config.fcm_base_url,
            &config.fcm_project_id,
            FcmAuth::ServiceAccount(provider),
        ))
    }

    pub fn with_auth(base_url: &str, fcm_project_id: &str, auth: FcmAuth) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            fcm_project_id: fcm_project_id.to_string(),
            auth,
        }
    }

    /// Confirms an access token can be minted.
    pub async fn health_check(&self) -> Result<(), ProviderError> {
        self.bearer().await.map(|_| ())
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        match &self.auth {
            FcmAuth::Static(token) => Ok(token.clone()),
            FcmAuth::ServiceAccount(provider) => provider
                .token(FCM_SCOPES)
                .await
                .map(|token| token.as_str().to_string())
                .map_err(|e| ProviderError::new(ProviderErrorCode::Authentication, e.to_string())),
        }
    }

    async fn send_message(&self, bearer: &str, message: FcmMessage) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.fcm_project_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(bearer)
            .json(&FcmRequest { message })
            .send()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorCode::Transport, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let sent: FcmSendResponse = response.json().await.map_err(|e| {
                ProviderError::new(
                    ProviderErrorCode::Unknown,
                    format!("Unreadable FCM response: {}", e),
                )
            })?;
            return Ok(sent.name);
        }

        let error_text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<FcmErrorResponse>(&error_text) {
            Ok(parsed) => Err(parsed.error.into_provider_error()),
            Err(_) => Err(ProviderError::new(
                code_for_status(status),
                format!("FCM request failed with status {}: {}", status, error_text),
            )),
        }
    }
}

fn code_for_status(status: StatusCode) -> ProviderErrorCode {
    match status {
        StatusCode::BAD_REQUEST => ProviderErrorCode::InvalidArgument,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorCode::Authentication,
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorCode::QuotaExceeded,
        StatusCode::SERVICE_UNAVAILABLE => ProviderErrorCode::Unavailable,
        s if s.is_server_error() => ProviderErrorCode::Internal,
        _ => ProviderErrorCode::Unknown,
    }
}

#[async_trait]
impl MessagingProvider for FcmClient {
    async fn send_one(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<String, ProviderError> {
        debug!(token = token_prefix(token), "Sending FCM push notification");

        let bearer = self.bearer().await?;
        let result = self
            .send_message(&bearer, FcmMessage::for_token(token, payload))
            .await;

        match &result {
            Ok(message_id) => info!(%message_id, "FCM push notification sent successfully"),
            Err(e) => warn!(token = token_prefix(token), error = %e, "FCM push notification failed"),
        }
        result
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<MulticastResponse, ProviderError> {
        if tokens.len() > MULTICAST_LIMIT {
            return Err(ProviderError::new(
                ProviderErrorCode::InvalidArgument,
                format!(
                    "multicast accepts at most {} tokens, got {}",
                    MULTICAST_LIMIT,
                    tokens.len()
                ),
            ));
        }

        let bearer = self.bearer().await?;

        debug!(token_count = tokens.len(), "Sending FCM multicast");

        let sends = tokens
            .iter()
            .map(|token| self.send_message(&bearer, FcmMessage::for_token(token, payload)));
        let responses: Vec<SendResponse> = join_all(sends)
            .await
            .into_iter()
            .map(|result| match result {
                Ok(message_id) => SendResponse::delivered(message_id),
                Err(error) => SendResponse::failed(error),
            })
            .collect();

        let response = MulticastResponse::from_responses(responses);

        info!(
            success = response.success_count,
            failure = response.failure_count,
            "FCM multicast completed"
        );

        Ok(response)
    }
}
