//! Connection-upgrade authentication: verify the bearer token, then require
//! a live session record for the claimed user.

use std::sync::Arc;

use super::error::AuthError;
use super::token::TokenCodec;
use crate::cache::ServerCache;
use crate::protocol::UserId;

pub struct Authenticator {
    codec: TokenCodec,
    cache: Arc<dyn ServerCache>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,
}

impl Authenticator {
    #[must_use]
    pub fn new(token_secret: impl Into<Vec<u8>>, cache: Arc<dyn ServerCache>) -> Self {
        Self {
            codec: TokenCodec::new(token_secret),
            cache,
        }
    }

    /// Verify `token`'s signature and expiry, then confirm the claimed user
    /// still has a live session record.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = self.codec.decode(token, now)?;

        let session = self
            .cache
            .get_session(&claims.user_id)
            .await
            .map_err(|_| AuthError::NoSession)?
            .ok_or(AuthError::NoSession)?;

        Ok(AuthenticatedUser {
            user_id: session.user_id,
            username: session.username,
        })
    }
}

/// Extract a bearer token from the `token` query parameter or
/// `Authorization: Bearer …` header, query parameter taking precedence.
#[must_use]
pub fn extract_token(query_token: Option<&str>, auth_header: Option<&str>) -> Option<String> {
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    auth_header
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::super::token::TokenClaims;
    use super::*;
    use crate::cache::{InMemoryCache, SessionRecord};

    fn cache() -> Arc<dyn ServerCache> {
        Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300))
    }

    #[tokio::test]
    async fn authenticates_when_token_valid_and_session_live() {
        let cache = cache();
        cache
            .put_session(
                "u1".to_string(),
                SessionRecord::new("u1".to_string(), "alice".to_string(), false),
            )
            .await
            .unwrap();

        let auth = Authenticator::new("secret", Arc::clone(&cache));
        let codec = TokenCodec::new("secret");
        let token = codec.encode(&TokenClaims {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            is_guest: false,
            exp: chrono::Utc::now().timestamp() + 60,
        });

        let user = auth.authenticate(&token).await.expect("authenticates");
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn rejects_token_with_no_matching_session() {
        let auth = Authenticator::new("secret", cache());
        let codec = TokenCodec::new("secret");
        let token = codec.encode(&TokenClaims {
            user_id: "ghost".to_string(),
            username: "ghost".to_string(),
            is_guest: false,
            exp: chrono::Utc::now().timestamp() + 60,
        });

        let err = auth.authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::NoSession));
    }

    #[test]
    fn extract_token_prefers_query_param() {
        let token = extract_token(Some("query-tok"), Some("Bearer header-tok"));
        assert_eq!(token.as_deref(), Some("query-tok"));
    }

    #[test]
    fn extract_token_falls_back_to_header() {
        let token = extract_token(None, Some("Bearer header-tok"));
        assert_eq!(token.as_deref(), Some("header-tok"));
    }

    #[test]
    fn extract_token_none_when_absent() {
        assert!(extract_token(None, None).is_none());
    }
}
