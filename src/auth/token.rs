//! Signed bearer-token verification.
//!
//! A token carries `{userID, username, exp}` as a base64url JSON payload
//! followed by an HMAC-SHA256 signature over that payload, in the form
//! `<payload>.<signature>`. Verifying a token proves the claim was minted
//! by someone holding the server's `token_secret`; it does not by itself
//! prove the session is still live — callers must also look up the
//! corresponding session record.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::protocol::UserId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub username: String,
    pub is_guest: bool,
    /// Unix timestamp (seconds) after which the token is no longer valid.
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Verifies and mints tokens signed with the server's `token_secret`.
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a new token for the given claims. Exposed for guest session
    /// issuance and tests; the full register/login HTTP surface that would
    /// otherwise produce these is out of scope.
    pub fn encode(&self, claims: &TokenClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("TokenClaims always serializes");
        let payload_b64 = BASE64.encode(&payload);
        let signature = self.sign(payload_b64.as_bytes());
        format!("{payload_b64}.{signature}")
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn decode(&self, token: &str, now_unix: i64) -> Result<TokenClaims, TokenError> {
        let (payload_b64, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;

        let expected = self.sign(payload_b64.as_bytes());
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(TokenError::InvalidSignature);
        }

        let payload = BASE64.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now_unix {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(payload);
        BASE64.encode(mac.finalize().into_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> TokenClaims {
        TokenClaims {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            is_guest: false,
            exp,
        }
    }

    #[test]
    fn round_trip_encode_decode() {
        let codec = TokenCodec::new("super-secret");
        let token = codec.encode(&claims(9_999_999_999));
        let decoded = codec.decode(&token, 1_000).expect("valid token");
        assert_eq!(decoded.user_id, "u1");
        assert_eq!(decoded.username, "alice");
    }

    #[test]
    fn rejects_expired_token() {
        let codec = TokenCodec::new("super-secret");
        let token = codec.encode(&claims(500));
        let err = codec.decode(&token, 1_000).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn rejects_tampered_signature() {
        let codec = TokenCodec::new("super-secret");
        let mut token = codec.encode(&claims(9_999_999_999));
        token.push('x');
        let err = codec.decode(&token, 1_000).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let codec_a = TokenCodec::new("secret-a");
        let codec_b = TokenCodec::new("secret-b");
        let token = codec_a.encode(&claims(9_999_999_999));
        let err = codec_b.decode(&token, 1_000).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn rejects_malformed_token() {
        let codec = TokenCodec::new("super-secret");
        let err = codec.decode("not-a-real-token", 1_000).unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }
}
