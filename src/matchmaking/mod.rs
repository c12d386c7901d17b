//! MMR-bucketed matchmaking queue with a widening window, background
//! sweep and group commit. No direct teacher analog — the background-loop
//! shape is grounded on `server::maintenance::cleanup_task`'s
//! `tokio::time::interval` loop, and cleanup-watcher spawning on
//! `rate_limit`'s cleanup-task idiom.

use crate::cache::{MatchAssignment, MatchmakingEntry, QueueStore, ServerCache};
use crate::config::{EngineConfig, MatchConfig, MatchmakerConfig};
use crate::matchcontrol::MatchController;
use crate::persistence::ResultsSink;
use crate::protocol::{MatchId, UserId};
use dashmap::DashMap;
use rand::RngExt;
use std::sync::Arc;
use std::time::Duration;

/// Singleton matchmaker: background 2 s sweep over the cache's queue,
/// owning the active-match registry it hands committed groups into.
pub struct Matchmaker {
    cache: Arc<dyn ServerCache>,
    config: MatchmakerConfig,
    engine_config: EngineConfig,
    match_config: MatchConfig,
    results_sink: Arc<dyn ResultsSink>,
    active_matches: DashMap<MatchId, Arc<MatchController>>,
}

impl Matchmaker {
    #[must_use]
    pub fn new(
        cache: Arc<dyn ServerCache>,
        config: MatchmakerConfig,
        engine_config: EngineConfig,
        match_config: MatchConfig,
        results_sink: Arc<dyn ResultsSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            config,
            engine_config,
            match_config,
            results_sink,
            active_matches: DashMap::new(),
        })
    }

    #[must_use]
    pub fn active_match(&self, match_id: &MatchId) -> Option<Arc<MatchController>> {
        self.active_matches.get(match_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Shared results sink, handed to a `MatchController::start` call once
    /// its expected players have all joined via `match:join`.
    #[must_use]
    pub fn results_sink(&self) -> Arc<dyn ResultsSink> {
        Arc::clone(&self.results_sink)
    }

    /// `Join(userID)`: self-dedups (removes any pre-existing entry),
    /// enqueues at the caller's MMR (the configured default for guests
    /// and any caller with no relational rating available).
    pub async fn join(&self, user_id: UserId, rated_mmr: Option<i32>) -> anyhow::Result<()> {
        let mmr = rated_mmr.unwrap_or(self.config.guest_mmr);
        self.cache.dequeue_matchmaking(&user_id).await?;
        self.cache
            .enqueue_matchmaking(MatchmakingEntry::new(user_id, mmr))
            .await
    }

    /// `Leave(userID)`: best-effort removal; a race with group-commit
    /// means the caller may still receive an assignment.
    pub async fn leave(&self, user_id: &UserId) -> anyhow::Result<()> {
        self.cache.dequeue_matchmaking(user_id).await?;
        Ok(())
    }

    /// Spawn the background sweep loop. Returns its `JoinHandle`; the
    /// caller holds it for shutdown purposes only, the loop runs forever.
    pub fn spawn_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let matchmaker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                matchmaker.config.loop_interval_secs,
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(err) = matchmaker.sweep().await {
                    tracing::warn!(error = %err, "matchmaking sweep failed");
                }
            }
        })
    }

    /// One sweep pass: snapshot the queue in MMR order, form and commit
    /// every eligible group.
    async fn sweep(&self) -> anyhow::Result<()> {
        let mut queue = self.cache.queue_snapshot().await?;

        while let Some(anchor) = queue.first().cloned() {
            let window = self.config.window_for_wait(anchor.wait_seconds());
            let mut group_len = 1usize;
            while group_len < queue.len() && group_len < self.config.max_players as usize {
                let candidate = &queue[group_len];
                if (candidate.mmr - anchor.mmr).abs() > window {
                    break;
                }
                group_len += 1;
            }

            if group_len < self.config.min_players as usize {
                // No eligible group at this anchor; it stays queued for
                // the next sweep. Move on to the next anchor so one
                // stubborn low-MMR player can't starve everyone behind it.
                queue.remove(0);
                continue;
            }

            let group: Vec<MatchmakingEntry> = queue.drain(0..group_len).collect();
            self.commit_group(group).await?;
        }

        Ok(())
    }

    async fn commit_group(&self, group: Vec<MatchmakingEntry>) -> anyhow::Result<()> {
        for entry in &group {
            self.cache.dequeue_matchmaking(&entry.user_id).await?;
        }

        let match_id = MatchId::new_v4();
        let map_seed = rand::rng().random_range(1..=u64::MAX);
        let player_count = u32::try_from(group.len()).unwrap_or(u32::MAX);

        let controller = MatchController::new(
            match_id,
            self.config.min_players,
            self.config.max_players,
            map_seed,
            self.engine_config.clone(),
            self.match_config.clone(),
        );
        self.active_matches.insert(match_id, Arc::clone(&controller));

        for entry in &group {
            self.cache
                .put_match_assignment(
                    entry.user_id.clone(),
                    MatchAssignment {
                        match_id,
                        player_count,
                        created_at: chrono::Utc::now(),
                    },
                )
                .await?;
        }

        self.spawn_cleanup_watcher(match_id, controller);
        Ok(())
    }

    /// Reclaims a match from the active registry once it reports
    /// `Finished`, mirroring `rate_limit`'s cleanup-task cadence.
    fn spawn_cleanup_watcher(self: &Arc<Self>, match_id: MatchId, controller: Arc<MatchController>) {
        let matchmaker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                if controller.phase().await == crate::protocol::MatchPhase::Finished {
                    matchmaker.active_matches.remove(&match_id);
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::persistence::InMemoryResultsSink;

    fn matchmaker() -> Arc<Matchmaker> {
        let cache: Arc<dyn ServerCache> = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let results_sink: Arc<dyn ResultsSink> = Arc::new(InMemoryResultsSink::new());
        Matchmaker::new(
            cache,
            MatchmakerConfig::default(),
            EngineConfig::default(),
            MatchConfig::default(),
            results_sink,
        )
    }

    #[tokio::test]
    async fn join_then_leave_empties_queue() {
        let mm = matchmaker();
        mm.join("u1".to_string(), None).await.unwrap();
        assert_eq!(mm.cache.queue_size().await.unwrap(), 1);
        mm.leave(&"u1".to_string()).await.unwrap();
        assert_eq!(mm.cache.queue_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_forms_no_group_below_minimum() {
        let mm = matchmaker();
        mm.join("solo".to_string(), Some(1000)).await.unwrap();
        mm.sweep().await.unwrap();
        assert_eq!(mm.cache.queue_size().await.unwrap(), 1);
        assert!(mm.active_matches.is_empty());
    }

    #[tokio::test]
    async fn sweep_commits_a_pair_within_window() {
        let mm = matchmaker();
        mm.join("u1".to_string(), Some(1000)).await.unwrap();
        mm.join("u2".to_string(), Some(1020)).await.unwrap();
        mm.sweep().await.unwrap();
        assert_eq!(mm.cache.queue_size().await.unwrap(), 0);
        assert_eq!(mm.active_matches.len(), 1);
    }

    #[tokio::test]
    async fn sweep_leaves_out_of_window_candidates_queued() {
        let mm = matchmaker();
        mm.join("low".to_string(), Some(100)).await.unwrap();
        mm.join("high".to_string(), Some(5000)).await.unwrap();
        mm.sweep().await.unwrap();
        // Neither anchor has a same-window partner yet; both stay queued.
        assert_eq!(mm.cache.queue_size().await.unwrap(), 2);
        assert!(mm.active_matches.is_empty());
    }
}
