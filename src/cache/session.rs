//! Session records: `session:<userID>`, 7-day TTL.

use crate::protocol::UserId;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A cached session record for an authenticated or guest user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub is_guest: bool,
}

impl SessionRecord {
    #[must_use]
    pub fn new(user_id: UserId, username: String, is_guest: bool) -> Self {
        let now = chrono::Utc::now();
        Self {
            user_id,
            username,
            email: None,
            created_at: now,
            last_seen: now,
            is_guest,
        }
    }
}

/// Session half of the cache seam.
#[async_trait]
pub trait SessionCache {
    async fn put_session(&self, user_id: UserId, record: SessionRecord) -> Result<()>;
    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>>;
    async fn refresh_session(&self, user_id: &UserId) -> Result<()>;
    async fn delete_session(&self, user_id: &UserId) -> Result<()>;
    async fn list_active_sessions(&self) -> Result<Vec<SessionRecord>>;
}
