use crate::metrics::{MetricsSnapshot, OperationLatencyMetrics};

/// Render the metrics snapshot into Prometheus text exposition format.
pub(crate) fn render_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    use std::fmt::Write;

    fn write_metric(buf: &mut String, name: &str, help: &str, metric_type: &str, value: f64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} {metric_type}");
        let _ = writeln!(buf, "{name} {value}");
    }

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "counter", value as f64);
    }

    fn gauge(buf: &mut String, name: &str, help: &str, value: u64) {
        write_metric(buf, name, help, "gauge", value as f64);
    }

    fn gauge_f64(buf: &mut String, name: &str, help: &str, value: f64) {
        write_metric(buf, name, help, "gauge", value);
    }

    fn emit_latency_metrics(buf: &mut String, metric_prefix: &str, description: &str, metrics: &OperationLatencyMetrics) {
        if let Some(value) = metrics.average_ms {
            gauge_f64(buf, &format!("{metric_prefix}_average_ms"), &format!("Average {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p50_ms {
            gauge_f64(buf, &format!("{metric_prefix}_p50_ms"), &format!("p50 {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p95_ms {
            gauge_f64(buf, &format!("{metric_prefix}_p95_ms"), &format!("p95 {description} latency in milliseconds"), value);
        }
        if let Some(value) = metrics.p99_ms {
            gauge_f64(buf, &format!("{metric_prefix}_p99_ms"), &format!("p99 {description} latency in milliseconds"), value);
        }
    }

    let mut buf = String::new();

    counter(&mut buf, "tank_royale_connections_total", "Total connections accepted since startup", snapshot.connections.total_connections);
    gauge(&mut buf, "tank_royale_connections_active", "Number of currently active connections", snapshot.connections.active_connections);
    counter(&mut buf, "tank_royale_connection_errors_total", "Total connection-level errors observed since startup", snapshot.connections.connection_errors);
    counter(&mut buf, "tank_royale_websocket_messages_dropped_total", "Server messages dropped because the outbound queue was full or timed out", snapshot.connections.websocket_messages_dropped);

    counter(&mut buf, "tank_royale_rooms_created_total", "Total rooms created since startup", snapshot.rooms.rooms_created);
    counter(&mut buf, "tank_royale_rooms_joined_total", "Total room joins processed since startup", snapshot.rooms.rooms_joined);
    counter(&mut buf, "tank_royale_rooms_deleted_total", "Total rooms deleted since startup", snapshot.rooms.rooms_deleted);
    gauge(&mut buf, "tank_royale_rooms_active", "Number of currently active rooms", snapshot.rooms.active_rooms);

    counter(&mut buf, "tank_royale_matches_started_total", "Total matches started since startup", snapshot.matches.matches_started);
    counter(&mut buf, "tank_royale_matches_ended_total", "Total matches ended since startup", snapshot.matches.matches_ended);
    gauge(&mut buf, "tank_royale_matches_active", "Number of currently active matches", snapshot.matches.active_matches);

    counter(&mut buf, "tank_royale_matchmaking_joins_total", "Total matchmaking queue joins since startup", snapshot.matchmaking.joins);
    counter(&mut buf, "tank_royale_matchmaking_leaves_total", "Total matchmaking queue leaves since startup", snapshot.matchmaking.leaves);
    gauge(&mut buf, "tank_royale_matchmaking_queue_size", "Current matchmaking queue size", snapshot.matchmaking.queue_size);

    counter(&mut buf, "tank_royale_cache_hits_total", "Total cache hits since startup", snapshot.cache.hits);
    counter(&mut buf, "tank_royale_cache_misses_total", "Total cache misses since startup", snapshot.cache.misses);

    counter(&mut buf, "tank_royale_auth_successes_total", "Total successful authentications since startup", snapshot.auth.successes);
    counter(&mut buf, "tank_royale_auth_failures_total", "Total failed authentications since startup", snapshot.auth.failures);

    counter(&mut buf, "tank_royale_errors_total", "Total errors encountered since startup", snapshot.errors.total_errors);
    counter(&mut buf, "tank_royale_errors_internal_total", "Internal errors encountered since startup", snapshot.errors.internal_errors);
    counter(&mut buf, "tank_royale_errors_websocket_total", "WebSocket transport errors encountered since startup", snapshot.errors.websocket_errors);
    counter(&mut buf, "tank_royale_errors_validation_total", "Protocol validation errors encountered since startup", snapshot.errors.validation_errors);

    emit_latency_metrics(&mut buf, "tank_royale_ws_handler_latency", "WebSocket handler", &snapshot.performance.ws_handler_latency);
    emit_latency_metrics(&mut buf, "tank_royale_http_handler_latency", "HTTP handler", &snapshot.performance.http_handler_latency);
    emit_latency_metrics(&mut buf, "tank_royale_cache_op_latency", "cache operation", &snapshot.performance.cache_op_latency);

    for (message_type, count) in &snapshot.message_counts {
        let _ = writeln!(buf, "tank_royale_messages_total{{type=\"{message_type}\"}} {count}");
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServerMetrics;

    #[tokio::test]
    async fn includes_core_counters() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_connections();
        metrics.decrement_active_connections();

        let snapshot = metrics.snapshot().await;
        let rendered = render_prometheus_metrics(&snapshot);

        assert!(rendered.contains("tank_royale_connections_total 2"));
        assert!(rendered.contains("tank_royale_connections_active 1"));
        assert!(rendered.contains("# TYPE tank_royale_errors_total counter"));
    }

    #[tokio::test]
    async fn survives_promtool_check() {
        let promtool_path = match std::env::var_os("PROMTOOL") {
            Some(path) if !path.is_empty() => std::path::PathBuf::from(path),
            _ => {
                eprintln!("PROMTOOL environment variable not set; skipping promtool validation test.");
                return;
            }
        };

        let metrics = ServerMetrics::new();
        let snapshot = metrics.snapshot().await;
        let rendered = render_prometheus_metrics(&snapshot);

        use std::io::Write;
        use std::process::{Command, Stdio};
        let mut child = Command::new(promtool_path)
            .arg("check")
            .arg("metrics")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start promtool");

        child.stdin.as_mut().unwrap().write_all(rendered.as_bytes()).unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success(), "stdout: {}\nstderr: {}", String::from_utf8_lossy(&output.stdout), String::from_utf8_lossy(&output.stderr));
    }
}
