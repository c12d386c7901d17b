#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Tank Royale Server
//!
//! The authoritative server for a real-time 2D battle-royale game:
//! matchmaking, fixed-tick simulation, and WebSocket fan-out.
//!
//! No relational database — matchmaking, room, and session state all
//! live in-memory behind the cache and connection registries.

/// Authentication middleware (in-memory backed)
pub mod auth;

/// Session / matchmaking queue / rate-limit cache (in-memory)
pub mod cache;

/// Server configuration and environment variables
pub mod config;

/// 30 Hz authoritative per-match simulation
pub mod engine;

/// Structured logging configuration
pub mod logging;

/// Deterministic seeded obstacle/crate map generation
pub mod mapgen;

/// Per-match state machine and Tick Engine lifecycle
pub mod matchcontrol;

/// MMR-bucketed matchmaking queue
pub mod matchmaking;

/// Metrics collection and reporting
pub mod metrics;

/// Best-effort match/result persistence
pub mod persistence;

/// WebSocket message protocol definitions
pub mod protocol;

/// TLS termination support
pub mod security;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
