//! Server/room behavior configuration types.

use super::defaults::{
    default_default_room_max_size, default_empty_room_timeout_secs,
    default_inactive_room_timeout_secs, default_max_join_attempts, default_max_room_creations,
    default_max_rooms, default_rate_limit_time_window_secs, default_room_cleanup_interval_secs,
};
use serde::{Deserialize, Serialize};

/// Server configuration for social room management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Default max size applied to rooms created without an explicit one
    #[serde(default = "default_default_room_max_size")]
    pub default_room_max_size: u32,
    /// Interval for the room reaper sweep (seconds)
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,
    /// Maximum number of concurrent rooms
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
    /// Time after creation when empty rooms expire (seconds)
    #[serde(default = "default_empty_room_timeout_secs")]
    pub empty_room_timeout_secs: u64,
    /// Time after last activity when non-empty rooms expire (seconds)
    #[serde(default = "default_inactive_room_timeout_secs")]
    pub inactive_room_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_room_max_size: default_default_room_max_size(),
            room_cleanup_interval_secs: default_room_cleanup_interval_secs(),
            max_rooms: default_max_rooms(),
            empty_room_timeout_secs: default_empty_room_timeout_secs(),
            inactive_room_timeout_secs: default_inactive_room_timeout_secs(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of room creation requests per time window
    #[serde(default = "default_max_room_creations")]
    pub max_room_creations: u32,
    /// Time window for rate limiting (seconds)
    #[serde(default = "default_rate_limit_time_window_secs")]
    pub time_window_secs: u64,
    /// Maximum number of join attempts per time window
    #[serde(default = "default_max_join_attempts")]
    pub max_join_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_room_creations: default_max_room_creations(),
            time_window_secs: default_rate_limit_time_window_secs(),
            max_join_attempts: default_max_join_attempts(),
        }
    }
}
