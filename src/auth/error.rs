use thiserror::Error;

use super::token::TokenError;

/// Authentication errors returned while establishing a connection.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no active session for this user")]
    NoSession,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
}
