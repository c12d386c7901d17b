//! Default value functions for configuration fields.
//!
//! Organized by category, matching each sibling config module's `#[serde(default = ...)]`
//! attributes.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3536
}

// =============================================================================
// Room Defaults
// =============================================================================

pub const fn default_room_cleanup_interval_secs() -> u64 {
    60
}

pub const fn default_empty_room_timeout_secs() -> u64 {
    300
}

pub const fn default_inactive_room_timeout_secs() -> u64 {
    3600
}

pub const fn default_max_rooms() -> usize {
    1000
}

pub const fn default_default_room_max_size() -> u32 {
    16
}

// =============================================================================
// Rate Limit Defaults
// =============================================================================

pub const fn default_max_room_creations() -> u32 {
    5
}

pub const fn default_rate_limit_time_window_secs() -> u64 {
    60
}

pub const fn default_max_join_attempts() -> u32 {
    20
}

// =============================================================================
// Protocol Defaults
// =============================================================================

pub const fn default_max_room_name_length() -> usize {
    64
}

pub const fn default_max_username_length() -> usize {
    32
}

pub const fn default_max_room_size_limit() -> u32 {
    100
}

pub const fn default_allow_unicode_usernames() -> bool {
    true
}

pub const fn default_allow_spaces_in_usernames() -> bool {
    true
}

pub const fn default_allow_leading_trailing_whitespace() -> bool {
    false
}

pub fn default_allowed_username_symbols() -> Vec<char> {
    vec!['-', '_']
}

// =============================================================================
// Matchmaker Defaults
// =============================================================================

pub const fn default_min_players() -> u32 {
    2
}

pub const fn default_max_players_per_match() -> u32 {
    16
}

pub const fn default_matchmaker_loop_interval_secs() -> u64 {
    2
}

pub const fn default_mmr_window_base() -> i32 {
    100
}

pub const fn default_mmr_window_step_per_10s() -> i32 {
    50
}

pub const fn default_mmr_window_cap() -> i32 {
    500
}

pub const fn default_guest_mmr() -> i32 {
    1000
}

pub const fn default_queue_wait_timeout_secs() -> u64 {
    300
}

// =============================================================================
// Match Defaults
// =============================================================================

pub const fn default_match_max_duration_secs() -> u64 {
    900
}

pub const fn default_match_ending_grace_secs() -> u64 {
    5
}

pub const fn default_match_end_check_interval_secs() -> u64 {
    1
}

// =============================================================================
// Engine Defaults
// =============================================================================

pub const fn default_tick_rate_hz() -> u32 {
    30
}

pub const fn default_lag_compensation_window_ms() -> u64 {
    200
}

pub const fn default_map_seed() -> u64 {
    0
}

// =============================================================================
// Cache / Session Defaults
// =============================================================================

pub const fn default_session_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}

pub const fn default_match_assignment_ttl_secs() -> i64 {
    300
}

pub const fn default_recent_matches_capacity() -> usize {
    100
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub const fn default_require_auth() -> bool {
    true
}

pub const fn default_max_message_size() -> usize {
    65536
}

pub const fn default_max_connections_per_ip() -> usize {
    10
}

pub fn default_token_secret() -> String {
    String::new()
}

pub const fn default_client_auth_mode() -> super::security::ClientAuthMode {
    super::security::ClientAuthMode::None
}

// =============================================================================
// Auth / Rate-limit cache maintenance defaults
// =============================================================================

pub const fn default_rate_limit_cache_cleanup_interval_secs() -> u64 {
    300
}

pub const fn default_rate_limit_cache_retention_secs() -> u64 {
    172_800
}

pub const fn default_rate_limit_cache_alert_rows() -> u64 {
    100_000
}
