use thiserror::Error;

const MIN_TOKEN_LEN: usize = 20;
const MAX_TOKEN_LEN: usize = 200;
const LOG_PREFIX_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenShapeError {
    #[error("device token cannot be empty")]
    Empty,
    #[error("device token too short (minimum {MIN_TOKEN_LEN} characters)")]
    TooShort,
    #[error("device token too long (maximum {MAX_TOKEN_LEN} characters)")]
    TooLong,
    #[error("device token contains invalid characters")]
    InvalidCharacters,
}

/// Shape check for an FCM registration token before it is stored.
pub fn validate_fcm_token(token: &str) -> Result<(), TokenShapeError> {
    if token.is_empty() {
        return Err(TokenShapeError::Empty);
    }
    if token.len() < MIN_TOKEN_LEN {
        return Err(TokenShapeError::TooShort);
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(TokenShapeError::TooLong);
    }

    let valid_chars = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'));
    if !valid_chars {
        return Err(TokenShapeError::InvalidCharacters);
    }

    Ok(())
}

/// Token prefix safe to put in logs.
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(LOG_PREFIX_LEN) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
