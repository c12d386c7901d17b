//! Configuration module.
//!
//! This module provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Server behavior configuration (rooms, timeouts)
//! - [`protocol`]: Wire/name validation limits
//! - [`matchmaker`]: Matchmaking queue tunables
//! - [`match_config`]: Match lifecycle tunables
//! - [`engine`]: Simulation tick rate and lag compensation
//! - [`security`]: Security and authentication settings
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod engine;
pub mod loader;
pub mod logging;
pub mod match_config;
pub mod matchmaker;
pub mod protocol;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use engine::EngineConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use match_config::MatchConfig;

pub use matchmaker::MatchmakerConfig;

pub use protocol::{ProtocolConfig, UsernameValidationConfig};

pub use security::{
    AuthMaintenanceConfig, ClientAuthMode, SecurityConfig, TlsServerConfig, TransportSecurityConfig,
};

pub use server::{RateLimitConfig, ServerConfig};

pub use types::Config;

pub use validation::{is_production_mode, validate_config_security};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3536);
        assert_eq!(config.server.default_room_max_size, 16);
        assert_eq!(config.server.room_cleanup_interval_secs, 60);
        assert_eq!(config.server.max_rooms, 1000);
        assert_eq!(config.server.empty_room_timeout_secs, 300);
        assert_eq!(config.server.inactive_room_timeout_secs, 3600);

        assert_eq!(config.rate_limit.max_room_creations, 5);
        assert_eq!(config.rate_limit.time_window_secs, 60);
        assert_eq!(config.rate_limit.max_join_attempts, 20);

        assert_eq!(config.protocol.max_room_name_length, 64);
        assert_eq!(config.protocol.max_username_length, 32);
        assert_eq!(config.protocol.max_room_size_limit, 100);

        assert_eq!(config.matchmaker.min_players, 2);
        assert_eq!(config.matchmaker.max_players, 16);
        assert_eq!(config.matchmaker.mmr_window_base, 100);

        assert_eq!(config.match_config.max_duration_secs, 900);
        assert_eq!(config.engine.tick_rate_hz, 30);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(
            config.server.default_room_max_size,
            deserialized.server.default_room_max_size
        );
        assert_eq!(
            config.rate_limit.max_room_creations,
            deserialized.rate_limit.max_room_creations
        );
        assert_eq!(
            config.protocol.max_room_name_length,
            deserialized.protocol.max_room_name_length
        );
        assert_eq!(
            config.matchmaker.mmr_window_cap,
            deserialized.matchmaker.mmr_window_cap
        );
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_username_validation_config() {
        let config = UsernameValidationConfig::default();

        assert!(config.is_allowed_symbol('-'));
        assert!(config.is_allowed_symbol('_'));
        assert!(!config.is_allowed_symbol('@'));
        assert!(!config.is_allowed_symbol('!'));

        let config_with_extra = UsernameValidationConfig {
            additional_allowed_characters: Some("@#".to_string()),
            ..Default::default()
        };
        assert!(config_with_extra.is_allowed_symbol('@'));
        assert!(config_with_extra.is_allowed_symbol('#'));
        assert!(!config_with_extra.is_allowed_symbol('!'));
    }
}
