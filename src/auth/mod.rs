pub mod connection_auth;
pub mod error;
pub mod rate_limiter;
pub mod token;

pub use connection_auth::{extract_token, AuthenticatedUser, Authenticator};
pub use error::AuthError;
pub use rate_limiter::InMemoryRateLimiter;
pub use token::{TokenClaims, TokenCodec, TokenError};
