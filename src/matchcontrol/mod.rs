//! Per-match state machine owning the Tick Engine task and its
//! end-condition monitor. Grounded on `protocol::room_state::Room`'s
//! lobby-state shape (guarded single transitions, capacity checks) and
//! `server::maintenance::cleanup_task`'s periodic monitor-loop pattern.

use crate::config::{EngineConfig, MatchConfig};
use crate::engine::{EngineInput, EngineOutcome, TickEngine};
use crate::mapgen;
use crate::persistence::{self, MatchRecord, PlayerResult, ResultsSink};
use crate::protocol::{GameStateSnapshot, MatchId, MatchPhase, RankingEntry, UserId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("match is not accepting players")]
    NotWaiting,
    #[error("player {0} already joined this match")]
    DuplicatePlayer(UserId),
    #[error("match is full")]
    Full,
    #[error("match does not have the minimum player count yet")]
    NotEnoughPlayers,
    #[error("map generation failed: {0}")]
    MapGenerationFailed(String),
}

/// Match-level event distinct from the per-tick `game:state` stream.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    MatchEnded {
        match_id: MatchId,
        rankings: Vec<RankingEntry>,
    },
}

struct JoinedPlayer {
    username: String,
}

/// Owns one match's lifecycle: `Waiting` → `Playing` → `Ending` →
/// `Finished`. Shared by `Arc` between the matchmaker's cleanup watcher
/// and every connection routed into the match.
pub struct MatchController {
    pub match_id: MatchId,
    phase: RwLock<MatchPhase>,
    min_players: u32,
    max_players: u32,
    map_seed: u64,
    engine_config: EngineConfig,
    match_config: MatchConfig,
    players: DashMap<UserId, JoinedPlayer>,
    join_order: RwLock<Vec<UserId>>,
    engine_input_tx: RwLock<Option<mpsc::Sender<(UserId, EngineInput)>>>,
    snapshot_tx: RwLock<Option<broadcast::Sender<GameStateSnapshot>>>,
    engine_cancel: RwLock<Option<CancellationToken>>,
    events_tx: RwLock<Option<broadcast::Sender<ControlEvent>>>,
    ending_started: AtomicBool,
}

impl MatchController {
    #[must_use]
    pub fn new(
        match_id: MatchId,
        min_players: u32,
        max_players: u32,
        map_seed: u64,
        engine_config: EngineConfig,
        match_config: MatchConfig,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            match_id,
            phase: RwLock::new(MatchPhase::Waiting),
            min_players,
            max_players,
            map_seed,
            engine_config,
            match_config,
            players: DashMap::new(),
            join_order: RwLock::new(Vec::new()),
            engine_input_tx: RwLock::new(None),
            snapshot_tx: RwLock::new(None),
            engine_cancel: RwLock::new(None),
            events_tx: RwLock::new(Some(events_tx)),
            ending_started: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub async fn phase(&self) -> MatchPhase {
        *self.phase.read().await
    }

    /// `AddPlayer`: allowed in `Waiting` only; rejects duplicates and
    /// overflow past `max_players`.
    pub async fn add_player(&self, user_id: UserId, username: String) -> Result<(), MatchError> {
        if *self.phase.read().await != MatchPhase::Waiting {
            return Err(MatchError::NotWaiting);
        }
        if self.players.contains_key(&user_id) {
            return Err(MatchError::DuplicatePlayer(user_id));
        }
        if self.players.len() >= self.max_players as usize {
            return Err(MatchError::Full);
        }
        self.join_order.write().await.push(user_id.clone());
        self.players.insert(user_id, JoinedPlayer { username });
        Ok(())
    }

    #[must_use]
    pub fn joined_count(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn all_expected_joined(&self, expected: u32) -> bool {
        self.players.len() >= expected as usize
    }

    /// Snapshot of every user currently joined, in join order.
    pub async fn joined_user_ids(&self) -> Vec<UserId> {
        self.join_order.read().await.clone()
    }

    /// Hand out a fresh snapshot subscription while the match is running.
    /// Returns `None` once the engine has stopped.
    pub async fn subscribe_snapshots(&self) -> Option<broadcast::Receiver<GameStateSnapshot>> {
        self.snapshot_tx.read().await.as_ref().map(broadcast::Sender::subscribe)
    }

    pub async fn subscribe_events(&self) -> Option<broadcast::Receiver<ControlEvent>> {
        self.events_tx.read().await.as_ref().map(broadcast::Sender::subscribe)
    }

    pub async fn send_input(&self, user_id: UserId, input: EngineInput) {
        if let Some(tx) = self.engine_input_tx.read().await.as_ref() {
            let _ = tx.send((user_id, input)).await;
        }
    }

    /// `Start()`: requires `Waiting` and at least `min_players`; generates
    /// the map, spawns the engine task and its end-condition monitor, and
    /// transitions to `Playing`.
    pub async fn start(
        self: &Arc<Self>,
        results_sink: Arc<dyn ResultsSink>,
        starting_mmr: impl Fn(&UserId) -> i32 + Send + Sync + 'static,
    ) -> Result<(), MatchError> {
        {
            let mut phase = self.phase.write().await;
            if *phase != MatchPhase::Waiting {
                return Err(MatchError::NotWaiting);
            }
            if self.players.len() < self.min_players as usize {
                return Err(MatchError::NotEnoughPlayers);
            }
            *phase = MatchPhase::Playing;
        }

        let map = mapgen::generate(self.map_seed);
        let join_order = self.join_order.read().await.clone();
        let players: Vec<(UserId, String)> = join_order
            .into_iter()
            .filter_map(|id| self.players.get(&id).map(|p| (id.clone(), p.username.clone())))
            .collect();

        let (engine, handle) = TickEngine::new(&map, players, &self.engine_config);

        *self.engine_input_tx.write().await = Some(handle.input_tx);
        *self.snapshot_tx.write().await = Some(handle.snapshot_tx.clone());
        *self.engine_cancel.write().await = Some(handle.cancel.clone());

        let monitor_snapshots = handle.snapshot_tx.subscribe();
        let controller = Arc::clone(self);
        let solo_test_mode = self.players.len() == 1;
        tokio::spawn(Self::monitor_end_conditions(
            Arc::clone(&controller),
            monitor_snapshots,
            solo_test_mode,
        ));

        let started_at = chrono::Utc::now();
        let player_count = u32::try_from(self.players.len()).unwrap_or(u32::MAX);
        tokio::spawn(Self::drive_engine_to_completion(
            controller,
            engine,
            results_sink,
            started_at,
            player_count,
            starting_mmr,
        ));

        Ok(())
    }

    async fn monitor_end_conditions(
        controller: Arc<Self>,
        mut snapshots: broadcast::Receiver<GameStateSnapshot>,
        solo_test_mode: bool,
    ) {
        let tick_rate = u64::from(controller.engine_config.tick_rate_hz.max(1));
        let max_duration_ticks = controller.match_config.max_duration_secs * tick_rate;
        let check_interval_ticks =
            (controller.match_config.end_check_interval_secs * tick_rate).max(1);

        loop {
            let snapshot = match snapshots.recv().await {
                Ok(snapshot) => snapshot,
                Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            };

            // Evaluated at the configured cadence, not every tick.
            if snapshot.tick % check_interval_ticks != 0 {
                continue;
            }

            let total = snapshot.players.len();
            let alive = snapshot.players.iter().filter(|p| p.is_alive).count();
            let one_or_zero_alive = alive <= 1 && total > 1 && !solo_test_mode;
            let all_dead = alive == 0;
            let timed_out = snapshot.tick >= max_duration_ticks;

            if one_or_zero_alive || all_dead || timed_out {
                controller.end_match().await;
                return;
            }
        }
    }

    /// `endMatch()`: transitions `Playing` → `Ending` exactly once.
    /// Stops the engine, then hands the completion task off to
    /// `drive_engine_to_completion`, which persists results and schedules
    /// the `Ending` → `Finished` transition.
    pub async fn end_match(&self) {
        if self.ending_started.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut phase = self.phase.write().await;
            if *phase == MatchPhase::Playing {
                *phase = MatchPhase::Ending;
            }
        }
        if let Some(cancel) = self.engine_cancel.read().await.as_ref() {
            cancel.cancel();
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_engine_to_completion(
        controller: Arc<Self>,
        engine: TickEngine,
        results_sink: Arc<dyn ResultsSink>,
        started_at: chrono::DateTime<chrono::Utc>,
        player_count: u32,
        starting_mmr: impl Fn(&UserId) -> i32,
    ) {
        let outcome: EngineOutcome = engine.run().await;

        // The engine dropped its own snapshot sender when `run` returned;
        // drop our clone too so subscribers see the channel fully closed.
        *controller.snapshot_tx.write().await = None;

        {
            let mut phase = controller.phase.write().await;
            if *phase == MatchPhase::Playing {
                *phase = MatchPhase::Ending;
            }
        }

        // Emit match_ended before persistence: a write failure must never
        // delay client notification.
        let rankings = outcome.rankings.clone();
        if let Some(tx) = controller.events_tx.read().await.as_ref() {
            let _ = tx.send(ControlEvent::MatchEnded {
                match_id: controller.match_id,
                rankings: rankings.clone(),
            });
        }

        Self::persist_results(&controller, &outcome, &results_sink, started_at, player_count, &starting_mmr)
            .await;

        let grace = controller.match_config.ending_grace_secs;
        tokio::time::sleep(std::time::Duration::from_secs(grace)).await;

        *controller.phase.write().await = MatchPhase::Finished;
        // Drop the events sender: any subscriber sees the channel close.
        controller.events_tx.write().await.take();
        controller.engine_input_tx.write().await.take();
    }

    async fn persist_results(
        controller: &Arc<Self>,
        outcome: &EngineOutcome,
        results_sink: &Arc<dyn ResultsSink>,
        started_at: chrono::DateTime<chrono::Utc>,
        player_count: u32,
        starting_mmr: &impl Fn(&UserId) -> i32,
    ) {
        let total = outcome.rankings.len();
        let tick_rate = u64::from(controller.engine_config.tick_rate_hz.max(1));
        let mut results = Vec::with_capacity(total);

        for ranking in &outcome.rankings {
            if persistence::skip_player(&ranking.user_id) {
                continue;
            }
            let current_mmr = starting_mmr(&ranking.user_id);
            let total_u32 = u32::try_from(total).unwrap_or(u32::MAX);
            let (_, mmr_change) = persistence::apply_mmr_delta(current_mmr, ranking.placement, total_u32);
            results.push(PlayerResult {
                match_id: controller.match_id,
                user_id: ranking.user_id.clone(),
                placement: ranking.placement,
                kills: ranking.kills,
                damage_dealt: ranking.damage_dealt,
                survival_time_secs: outcome.duration_ticks / tick_rate,
                mmr_change,
            });
        }

        let record = MatchRecord {
            match_id: controller.match_id,
            map_name: "procedural".to_string(),
            player_count,
            start_time: started_at,
            end_time: chrono::Utc::now(),
            duration_secs: outcome.duration_ticks / tick_rate,
            results,
        };

        if let Err(err) = results_sink.record_match(record).await {
            tracing::warn!(match_id = %controller.match_id, error = %err, "match result persistence failed");
        }
    }
}
