use std::collections::BTreeSet;

use crate::error::ProviderError;

/// Result of one send as reported by the provider.
#[derive(Debug, Clone)]
pub struct SendResponse {
    pub message_id: Option<String>,
    pub error: Option<ProviderError>,
}

impl SendResponse {
    pub fn delivered(message_id: String) -> Self {
        Self {
            message_id: Some(message_id),
            error: None,
        }
    }

    pub fn failed(error: ProviderError) -> Self {
        Self {
            message_id: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Answer to a single multicast call; `responses` is index-aligned with the tokens sent.
#[derive(Debug, Clone)]
pub struct MulticastResponse {
    pub success_count: u32,
    pub failure_count: u32,
    pub responses: Vec<SendResponse>,
}

impl MulticastResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.is_success()).count() as u32;
        let failure_count = responses.len() as u32 - success_count;

        Self {
            success_count,
            failure_count,
            responses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed {
        reason: String,
        token_invalid: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResult {
    pub device_token: String,
    pub outcome: DeliveryOutcome,
}

impl TokenResult {
    pub fn from_response(device_token: &str, response: &SendResponse) -> Self {
        let outcome = match &response.error {
            None => DeliveryOutcome::Sent,
            Some(error) => DeliveryOutcome::Failed {
                reason: if error.is_invalid_token() {
                    "Invalid or expired token".to_string()
                } else {
                    error.to_string()
                },
                token_invalid: error.is_invalid_token(),
            },
        };

        Self {
            device_token: device_token.to_string(),
            outcome,
        }
    }
}

/// Aggregate over every chunk of a dispatch; `results` follows input token order.
#[derive(Debug, Clone, Default)]
pub struct DispatchAggregate {
    pub sent_count: u32,
    pub failed_count: u32,
    pub invalid_tokens: BTreeSet<String>,
    pub results: Vec<TokenResult>,
}

impl DispatchAggregate {
    pub fn absorb(&mut self, tokens: &[String], response: &MulticastResponse) {
        self.sent_count += response.success_count;
        self.failed_count += response.failure_count;

        for (token, send) in tokens.iter().zip(&response.responses) {
            let result = TokenResult::from_response(token, send);
            if let DeliveryOutcome::Failed {
                token_invalid: true,
                ..
            } = result.outcome
            {
                self.invalid_tokens.insert(token.clone());
            }
            self.results.push(result);
        }
    }
}
