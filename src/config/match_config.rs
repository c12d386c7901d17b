//! Match lifecycle tunables: duration caps and end-of-match bookkeeping.

use super::defaults::{
    default_match_end_check_interval_secs, default_match_ending_grace_secs,
    default_match_max_duration_secs,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchConfig {
    /// Hard ceiling on a match's total lifetime, regardless of player count (seconds)
    #[serde(default = "default_match_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Time spent in the `Ending` phase before transitioning to `Finished` (seconds)
    #[serde(default = "default_match_ending_grace_secs")]
    pub ending_grace_secs: u64,
    /// Interval at which the match supervisor checks win/timeout conditions (seconds)
    #[serde(default = "default_match_end_check_interval_secs")]
    pub end_check_interval_secs: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_match_max_duration_secs(),
            ending_grace_secs: default_match_ending_grace_secs(),
            end_check_interval_secs: default_match_end_check_interval_secs(),
        }
    }
}
