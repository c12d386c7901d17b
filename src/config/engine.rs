//! Simulation engine tunables: tick rate, lag compensation, map generation seed.

use super::defaults::{
    default_lag_compensation_window_ms, default_map_seed, default_tick_rate_hz,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Fixed simulation tick rate
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    /// Width of the position history window kept for hit-scan rewind (milliseconds)
    #[serde(default = "default_lag_compensation_window_ms")]
    pub lag_compensation_window_ms: u64,
    /// Seed for deterministic map/obstacle generation; 0 means randomize per match
    #[serde(default = "default_map_seed")]
    pub map_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            lag_compensation_window_ms: default_lag_compensation_window_ms(),
            map_seed: default_map_seed(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn tick_interval_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate_hz)
    }

    #[must_use]
    pub fn lag_compensation_ticks(&self) -> u64 {
        self.lag_compensation_window_ms * u64::from(self.tick_rate_hz) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_matches_30hz() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.tick_interval_ms(), 33);
        assert_eq!(cfg.lag_compensation_ticks(), 6);
    }
}
