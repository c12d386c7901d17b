//! Matchmaking queue entries and match assignments.

use crate::protocol::{MatchId, UserId};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One user waiting in the matchmaking queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingEntry {
    pub user_id: UserId,
    pub mmr: i32,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl MatchmakingEntry {
    #[must_use]
    pub fn new(user_id: UserId, mmr: i32) -> Self {
        Self {
            user_id,
            mmr,
            joined_at: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn wait_seconds(&self) -> u64 {
        chrono::Utc::now()
            .signed_duration_since(self.joined_at)
            .num_seconds()
            .max(0) as u64
    }
}

/// Assignment handed to a player once the matchmaker commits a group,
/// cache key `assignment:<userID>`, 5-minute TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub match_id: MatchId,
    pub player_count: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Matchmaking queue + assignment half of the cache seam.
#[async_trait]
pub trait QueueStore {
    async fn enqueue_matchmaking(&self, entry: MatchmakingEntry) -> Result<()>;
    async fn dequeue_matchmaking(&self, user_id: &UserId) -> Result<Option<MatchmakingEntry>>;
    /// MMR-ascending snapshot of the whole queue.
    async fn queue_snapshot(&self) -> Result<Vec<MatchmakingEntry>>;
    async fn queue_size(&self) -> Result<usize>;
    async fn put_match_assignment(&self, user_id: UserId, assignment: MatchAssignment)
        -> Result<()>;
    async fn get_match_assignment(&self, user_id: &UserId) -> Result<Option<MatchAssignment>>;
}
