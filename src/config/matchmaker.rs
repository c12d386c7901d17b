//! Matchmaker tunables: group sizing and MMR window widening.

use super::defaults::{
    default_guest_mmr, default_matchmaker_loop_interval_secs, default_max_players_per_match,
    default_min_players, default_mmr_window_base, default_mmr_window_cap,
    default_mmr_window_step_per_10s, default_queue_wait_timeout_secs,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchmakerConfig {
    /// Minimum group size committed as a match
    #[serde(default = "default_min_players")]
    pub min_players: u32,
    /// Maximum players admitted to one match
    #[serde(default = "default_max_players_per_match")]
    pub max_players: u32,
    /// Interval between matchmaking sweep passes (seconds)
    #[serde(default = "default_matchmaker_loop_interval_secs")]
    pub loop_interval_secs: u64,
    /// Starting MMR window half-width around the anchor
    #[serde(default = "default_mmr_window_base")]
    pub mmr_window_base: i32,
    /// Window growth per 10 seconds of anchor wait time
    #[serde(default = "default_mmr_window_step_per_10s")]
    pub mmr_window_step_per_10s: i32,
    /// Hard ceiling on the widened MMR window
    #[serde(default = "default_mmr_window_cap")]
    pub mmr_window_cap: i32,
    /// MMR assigned to guest users with no persisted rating
    #[serde(default = "default_guest_mmr")]
    pub guest_mmr: i32,
    /// Maximum time a queue entry may wait before it is considered stale
    #[serde(default = "default_queue_wait_timeout_secs")]
    pub queue_wait_timeout_secs: u64,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            min_players: default_min_players(),
            max_players: default_max_players_per_match(),
            loop_interval_secs: default_matchmaker_loop_interval_secs(),
            mmr_window_base: default_mmr_window_base(),
            mmr_window_step_per_10s: default_mmr_window_step_per_10s(),
            mmr_window_cap: default_mmr_window_cap(),
            guest_mmr: default_guest_mmr(),
            queue_wait_timeout_secs: default_queue_wait_timeout_secs(),
        }
    }
}

impl MatchmakerConfig {
    /// Dynamic MMR window for an anchor that has waited `wait_seconds`.
    #[must_use]
    pub fn window_for_wait(&self, wait_seconds: u64) -> i32 {
        let widened =
            self.mmr_window_base + self.mmr_window_step_per_10s * i32::try_from(wait_seconds / 10).unwrap_or(i32::MAX);
        widened.min(self.mmr_window_cap)
    }
}
