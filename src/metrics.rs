//! Metrics collection: fixed counters/gauges plus per-operation latency
//! histograms, exposed read-only through `/metrics` (JSON) and
//! `/metrics/prom` (Prometheus text exposition). Purely observational —
//! nothing here drives control flow.

use dashmap::DashMap;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct ServerMetrics {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub connection_errors: AtomicU64,
    pub websocket_messages_dropped: AtomicU64,

    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_deleted: AtomicU64,
    pub active_rooms: AtomicU64,

    pub matches_started: AtomicU64,
    pub matches_ended: AtomicU64,
    pub active_matches: AtomicU64,

    pub matchmaking_joins: AtomicU64,
    pub matchmaking_leaves: AtomicU64,
    pub matchmaking_queue_size: AtomicU64,

    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,

    pub auth_successes: AtomicU64,
    pub auth_failures: AtomicU64,

    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
    pub websocket_errors: AtomicU64,

    pub persistence_failures: AtomicU64,

    message_counts: DashMap<&'static str, AtomicU64>,

    average_response_times: RwLock<ResponseTimeTracker>,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            websocket_messages_dropped: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_joined: AtomicU64::new(0),
            rooms_deleted: AtomicU64::new(0),
            active_rooms: AtomicU64::new(0),
            matches_started: AtomicU64::new(0),
            matches_ended: AtomicU64::new(0),
            active_matches: AtomicU64::new(0),
            matchmaking_joins: AtomicU64::new(0),
            matchmaking_leaves: AtomicU64::new(0),
            matchmaking_queue_size: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            auth_successes: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            websocket_errors: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            message_counts: DashMap::new(),
            average_response_times: RwLock::new(ResponseTimeTracker::new()),
        }
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        let previous = self.active_connections.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| current.checked_sub(1),
        );
        if previous.is_err() {
            tracing::warn!("active_connections underflow avoided");
        }
    }

    pub fn increment_connection_errors(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_messages_dropped(&self) {
        self.websocket_messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_joined(&self) {
        self.rooms_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_deleted(&self) {
        self.rooms_deleted.fetch_add(1, Ordering::Relaxed);
        let _ = self.active_rooms.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            c.checked_sub(1)
        });
    }

    pub fn set_active_rooms(&self, count: u64) {
        self.active_rooms.store(count, Ordering::Relaxed);
    }

    pub fn increment_matches_started(&self) {
        self.matches_started.fetch_add(1, Ordering::Relaxed);
        self.active_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matches_ended(&self) {
        self.matches_ended.fetch_add(1, Ordering::Relaxed);
        let _ = self.active_matches.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
            c.checked_sub(1)
        });
    }

    pub fn increment_matchmaking_joins(&self) {
        self.matchmaking_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matchmaking_leaves(&self) {
        self.matchmaking_leaves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_matchmaking_queue_size(&self, size: u64) {
        self.matchmaking_queue_size.store(size, Ordering::Relaxed);
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_success(&self) {
        self.auth_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Per-message-type inbound counter, keyed by the wire `type` string.
    pub fn increment_message_type(&self, message_type: &'static str) {
        self.message_counts
            .entry(message_type)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record one latency sample for a named operation (e.g.
    /// `ws_handler`, `http_handler`, `cache_op`).
    pub async fn record_latency(&self, operation: &str, duration: Duration) {
        let mut tracker = self.average_response_times.write().await;
        tracker.add_sample(operation, duration);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let tracker = self.average_response_times.read().await;
        let ws_handler_latency = tracker.get_latency_metrics("ws_handler").unwrap_or_default();
        let http_handler_latency =
            tracker.get_latency_metrics("http_handler").unwrap_or_default();
        let cache_op_latency = tracker.get_latency_metrics("cache_op").unwrap_or_default();
        drop(tracker);

        let message_counts: HashMap<String, u64> = self
            .message_counts
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);
        let websocket_errors = self.websocket_errors.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                connection_errors: self.connection_errors.load(Ordering::Relaxed),
                websocket_messages_dropped: self
                    .websocket_messages_dropped
                    .load(Ordering::Relaxed),
            },
            rooms: RoomMetrics {
                rooms_created: self.rooms_created.load(Ordering::Relaxed),
                rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
                rooms_deleted: self.rooms_deleted.load(Ordering::Relaxed),
                active_rooms: self.active_rooms.load(Ordering::Relaxed),
            },
            matches: MatchMetrics {
                matches_started: self.matches_started.load(Ordering::Relaxed),
                matches_ended: self.matches_ended.load(Ordering::Relaxed),
                active_matches: self.active_matches.load(Ordering::Relaxed),
            },
            matchmaking: MatchmakingMetrics {
                joins: self.matchmaking_joins.load(Ordering::Relaxed),
                leaves: self.matchmaking_leaves.load(Ordering::Relaxed),
                queue_size: self.matchmaking_queue_size.load(Ordering::Relaxed),
            },
            cache: CacheMetrics {
                hits: self.cache_hits.load(Ordering::Relaxed),
                misses: self.cache_misses.load(Ordering::Relaxed),
            },
            auth: AuthMetrics {
                successes: self.auth_successes.load(Ordering::Relaxed),
                failures: self.auth_failures.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                validation_errors,
                internal_errors,
                websocket_errors,
                total_errors: validation_errors + internal_errors + websocket_errors,
            },
            performance: PerformanceMetrics {
                ws_handler_latency,
                http_handler_latency,
                cache_op_latency,
            },
            message_counts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub matches: MatchMetrics,
    pub matchmaking: MatchmakingMetrics,
    pub cache: CacheMetrics,
    pub auth: AuthMetrics,
    pub errors: ErrorMetrics,
    pub performance: PerformanceMetrics,
    pub message_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub connection_errors: u64,
    pub websocket_messages_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_deleted: u64,
    pub active_rooms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchMetrics {
    pub matches_started: u64,
    pub matches_ended: u64,
    pub active_matches: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchmakingMetrics {
    pub joins: u64,
    pub leaves: u64,
    pub queue_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthMetrics {
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub websocket_errors: u64,
    pub total_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerformanceMetrics {
    pub ws_handler_latency: OperationLatencyMetrics,
    pub http_handler_latency: OperationLatencyMetrics,
    pub cache_op_latency: OperationLatencyMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperationLatencyMetrics {
    pub average_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

/// Per-operation latency tracking backed by hdrhistogram, carried from
/// this codebase's original metrics module.
#[derive(Debug)]
struct ResponseTimeTracker {
    operations: HashMap<String, OperationLatencyHistogram>,
}

impl ResponseTimeTracker {
    fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    fn add_sample(&mut self, operation: &str, duration: Duration) {
        let histogram = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(|| OperationLatencyHistogram::new(1, 60_000, 3));
        histogram.record(duration);
    }

    fn get_latency_metrics(&self, operation: &str) -> Option<OperationLatencyMetrics> {
        self.operations.get(operation).map(OperationLatencyHistogram::metrics)
    }
}

#[derive(Debug)]
struct OperationLatencyHistogram {
    histogram: Option<Histogram<u64>>,
}

impl OperationLatencyHistogram {
    fn new(lowest: u64, highest: u64, sig_figs: u8) -> Self {
        Self {
            histogram: Histogram::new_with_bounds(lowest, highest, sig_figs).ok(),
        }
    }

    fn record(&mut self, duration: Duration) {
        let Some(histogram) = self.histogram.as_mut() else {
            return;
        };
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1);
        let clamped = millis.min(histogram.high());
        let _ = histogram.record(clamped);
    }

    fn metrics(&self) -> OperationLatencyMetrics {
        let Some(histogram) = self.histogram.as_ref() else {
            return OperationLatencyMetrics::default();
        };
        if histogram.len() == 0 {
            return OperationLatencyMetrics::default();
        }
        OperationLatencyMetrics {
            average_ms: Some(histogram.mean()),
            p50_ms: Some(histogram.value_at_quantile(0.5) as f64),
            p95_ms: Some(histogram.value_at_quantile(0.95) as f64),
            p99_ms: Some(histogram.value_at_quantile(0.99) as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_counters_track_active_count() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_active_connections();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.connections.total_connections, 2);
        assert_eq!(snapshot.connections.active_connections, 1);
    }

    #[tokio::test]
    async fn message_type_counters_are_keyed_independently() {
        let metrics = ServerMetrics::new();
        metrics.increment_message_type("ping");
        metrics.increment_message_type("ping");
        metrics.increment_message_type("player_input");

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.message_counts.get("ping"), Some(&2));
        assert_eq!(snapshot.message_counts.get("player_input"), Some(&1));
    }

    #[tokio::test]
    async fn latency_samples_populate_percentiles() {
        let metrics = ServerMetrics::new();
        for ms in [5, 10, 15, 20, 25] {
            metrics.record_latency("ws_handler", Duration::from_millis(ms)).await;
        }
        let snapshot = metrics.snapshot().await;
        assert!(snapshot.performance.ws_handler_latency.average_ms.is_some());
        assert!(snapshot.performance.ws_handler_latency.p50_ms.is_some());
    }

    #[test]
    fn active_connections_does_not_underflow() {
        let metrics = ServerMetrics::new();
        metrics.decrement_active_connections();
        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 0);
    }
}
