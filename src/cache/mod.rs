//! In-process session / matchmaking / rate-limit cache.
//!
//! Mirrors the role `GameDatabase` plays in the room-signaling
//! predecessor: a typed storage seam behind a trait, so a networked
//! backend could later be substituted without touching callers. Every
//! entry that represents a temporary resource carries a TTL; expiry is
//! checked lazily on read and swept by a periodic maintenance sweep
//! rather than a per-key timer.

mod queue;
mod session;

pub use queue::{MatchAssignment, MatchmakingEntry, QueueStore};
pub use session::{SessionCache, SessionRecord};

use crate::protocol::UserId;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Unified storage seam for sessions, matchmaking, match assignments, and
/// per-endpoint rate limits.
#[async_trait]
pub trait ServerCache: SessionCache + QueueStore + Send + Sync {
    /// Atomic increment + 60-second sliding window; returns the count
    /// observed in the window after this request is recorded.
    fn rate_limit(&self, user_id: &UserId, endpoint: &str) -> u32;

    /// Remove expired sessions, assignments, and queue entries.
    async fn sweep_expired(&self) -> Result<usize>;
}

/// Single in-process implementation backing `SessionCache` + `QueueStore` +
/// the rate-limit window, analogous to the teacher's `InMemoryDatabase`.
pub struct InMemoryCache {
    sessions: DashMap<UserId, SessionRecord>,
    assignments: DashMap<UserId, MatchAssignment>,
    queue: tokio::sync::RwLock<Vec<MatchmakingEntry>>,
    rate_limit_windows: DashMap<String, VecDeque<Instant>>,
    session_ttl_secs: i64,
    match_assignment_ttl_secs: i64,
}

impl InMemoryCache {
    #[must_use]
    pub fn new(session_ttl_secs: i64, match_assignment_ttl_secs: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            assignments: DashMap::new(),
            queue: tokio::sync::RwLock::new(Vec::new()),
            rate_limit_windows: DashMap::new(),
            session_ttl_secs,
            match_assignment_ttl_secs,
        }
    }
}

#[async_trait]
impl SessionCache for InMemoryCache {
    async fn put_session(&self, user_id: UserId, mut record: SessionRecord) -> Result<()> {
        let now = chrono::Utc::now();
        record.last_seen = now;
        self.sessions.insert(user_id, record);
        Ok(())
    }

    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>> {
        match self.sessions.get(user_id) {
            Some(entry) if !is_expired(entry.last_seen, self.session_ttl_secs) => {
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn refresh_session(&self, user_id: &UserId) -> Result<()> {
        let Some(mut entry) = self.sessions.get_mut(user_id) else {
            anyhow::bail!("session not found for {user_id}");
        };
        if is_expired(entry.last_seen, self.session_ttl_secs) {
            anyhow::bail!("session for {user_id} has expired");
        }
        entry.last_seen = chrono::Utc::now();
        Ok(())
    }

    async fn delete_session(&self, user_id: &UserId) -> Result<()> {
        self.sessions.remove(user_id);
        Ok(())
    }

    async fn list_active_sessions(&self) -> Result<Vec<SessionRecord>> {
        let ttl = self.session_ttl_secs;
        Ok(self
            .sessions
            .iter()
            .filter(|entry| !is_expired(entry.last_seen, ttl))
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl QueueStore for InMemoryCache {
    async fn enqueue_matchmaking(&self, entry: MatchmakingEntry) -> Result<()> {
        let mut queue = self.queue.write().await;
        queue.retain(|existing| existing.user_id != entry.user_id);
        queue.push(entry);
        Ok(())
    }

    async fn dequeue_matchmaking(&self, user_id: &UserId) -> Result<Option<MatchmakingEntry>> {
        let mut queue = self.queue.write().await;
        let Some(pos) = queue.iter().position(|e| &e.user_id == user_id) else {
            return Ok(None);
        };
        Ok(Some(queue.remove(pos)))
    }

    async fn queue_snapshot(&self) -> Result<Vec<MatchmakingEntry>> {
        let mut queue = self.queue.read().await.clone();
        queue.sort_by_key(|e| e.mmr);
        Ok(queue)
    }

    async fn queue_size(&self) -> Result<usize> {
        Ok(self.queue.read().await.len())
    }

    async fn put_match_assignment(
        &self,
        user_id: UserId,
        assignment: MatchAssignment,
    ) -> Result<()> {
        self.assignments.insert(user_id, assignment);
        Ok(())
    }

    async fn get_match_assignment(&self, user_id: &UserId) -> Result<Option<MatchAssignment>> {
        match self.assignments.get(user_id) {
            Some(entry) if !is_expired(entry.created_at, self.match_assignment_ttl_secs) => {
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ServerCache for InMemoryCache {
    fn rate_limit(&self, user_id: &UserId, endpoint: &str) -> u32 {
        let key = format!("{user_id}:{endpoint}");
        let now = Instant::now();
        let window = Duration::from_secs(60);

        let mut entry = self.rate_limit_windows.entry(key).or_default();
        while let Some(&front) = entry.front() {
            if now.duration_since(front) > window {
                entry.pop_front();
            } else {
                break;
            }
        }
        entry.push_back(now);
        u32::try_from(entry.len()).unwrap_or(u32::MAX)
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let mut removed = 0usize;

        let session_ttl = self.session_ttl_secs;
        self.sessions.retain(|_, record| {
            let keep = !is_expired(record.last_seen, session_ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        let assignment_ttl = self.match_assignment_ttl_secs;
        self.assignments.retain(|_, assignment| {
            let keep = !is_expired(assignment.created_at, assignment_ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        let now = Instant::now();
        let window = Duration::from_secs(60);
        self.rate_limit_windows.retain(|_, timestamps| {
            while let Some(&front) = timestamps.front() {
                if now.duration_since(front) > window {
                    timestamps.pop_front();
                } else {
                    break;
                }
            }
            !timestamps.is_empty()
        });

        Ok(removed)
    }
}

fn is_expired(since: chrono::DateTime<chrono::Utc>, ttl_secs: i64) -> bool {
    chrono::Utc::now().signed_duration_since(since) > chrono::Duration::seconds(ttl_secs)
}

/// Spawn the periodic cache maintenance sweep, mirroring the teacher's
/// `start_cleanup_task` pattern for `InMemoryRateLimiter`.
pub fn spawn_maintenance_task(
    cache: Arc<InMemoryCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match cache.sweep_expired().await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(removed, "cache maintenance sweep removed expired entries");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "cache maintenance sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cache() -> InMemoryCache {
        InMemoryCache::new(7 * 24 * 60 * 60, 300)
    }

    #[tokio::test]
    async fn session_round_trips() {
        let cache = make_cache();
        let user_id: UserId = "user-1".to_string();
        cache
            .put_session(user_id.clone(), SessionRecord::new(user_id.clone(), "Ada".to_string(), false))
            .await
            .unwrap();

        let fetched = cache.get_session(&user_id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().username, "Ada");
    }

    #[tokio::test]
    async fn refresh_missing_session_fails() {
        let cache = make_cache();
        let result = cache.refresh_session(&"ghost".to_string()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn matchmaking_queue_orders_by_mmr() {
        let cache = make_cache();
        cache
            .enqueue_matchmaking(MatchmakingEntry::new("low".to_string(), 800))
            .await
            .unwrap();
        cache
            .enqueue_matchmaking(MatchmakingEntry::new("high".to_string(), 1800))
            .await
            .unwrap();

        let snapshot = cache.queue_snapshot().await.unwrap();
        assert_eq!(snapshot[0].user_id, "low");
        assert_eq!(snapshot[1].user_id, "high");
    }

    #[tokio::test]
    async fn dequeue_removes_entry() {
        let cache = make_cache();
        cache
            .enqueue_matchmaking(MatchmakingEntry::new("u1".to_string(), 1000))
            .await
            .unwrap();
        let dequeued = cache.dequeue_matchmaking(&"u1".to_string()).await.unwrap();
        assert!(dequeued.is_some());
        assert_eq!(cache.queue_size().await.unwrap(), 0);
    }

    #[test]
    fn rate_limit_counts_within_window() {
        let cache = make_cache();
        let user_id = "u1".to_string();
        for expected in 1..=5u32 {
            assert_eq!(cache.rate_limit(&user_id, "join"), expected);
        }
    }

    #[tokio::test]
    async fn match_assignment_round_trips() {
        let cache = make_cache();
        let user_id = "u1".to_string();
        cache
            .put_match_assignment(
                user_id.clone(),
                MatchAssignment {
                    match_id: "m1".to_string(),
                    player_count: 4,
                    created_at: chrono::Utc::now(),
                },
            )
            .await
            .unwrap();

        let assignment = cache.get_match_assignment(&user_id).await.unwrap();
        assert_eq!(assignment.unwrap().match_id, "m1");
    }
}
