use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};

use crate::server::GameServer;

use super::prometheus::render_prometheus_metrics;

fn enforce_metrics_auth(headers: &HeaderMap, server: &GameServer) -> Result<(), StatusCode> {
    let Some(raw_header) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) else {
        tracing::warn!("unauthorized metrics access attempt: missing Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Some(token) = raw_header.strip_prefix("Bearer ") else {
        tracing::warn!("unauthorized metrics access attempt: invalid Authorization scheme");
        return Err(StatusCode::UNAUTHORIZED);
    };
    if server.config.security.metrics_auth_token.as_deref() == Some(token) {
        return Ok(());
    }
    tracing::warn!("unauthorized metrics access attempt: token rejected");
    Err(StatusCode::UNAUTHORIZED)
}

#[derive(serde::Deserialize)]
pub struct MetricsQuery {
    #[serde(default, rename = "includeSnapshot")]
    include_snapshot: bool,
}

/// JSON metrics endpoint: always returns the current snapshot, plus the
/// raw per-field breakdown when `includeSnapshot=true`.
pub async fn metrics_handler(
    headers: HeaderMap,
    State(server): State<Arc<GameServer>>,
    axum::extract::Query(query): axum::extract::Query<MetricsQuery>,
) -> axum::response::Result<axum::response::Json<serde_json::Value>> {
    if server.config.security.require_metrics_auth {
        enforce_metrics_auth(&headers, server.as_ref())?;
    }

    let snapshot = server.metrics.snapshot().await;
    let mut response = serde_json::json!({
        "timestamp": snapshot.timestamp.to_rfc3339(),
        "connections": snapshot.connections,
        "rooms": snapshot.rooms,
        "matches": snapshot.matches,
        "matchmaking": snapshot.matchmaking,
        "cache": snapshot.cache,
        "auth": snapshot.auth,
        "errors": snapshot.errors,
        "performance": snapshot.performance,
    });

    if query.include_snapshot {
        if let Ok(snapshot_value) = serde_json::to_value(&snapshot) {
            if let Some(obj) = response.as_object_mut() {
                obj.insert("metricsSnapshot".to_string(), snapshot_value);
            }
        }
    }

    Ok(axum::response::Json(response))
}

/// Prometheus metrics endpoint (text format, version 0.0.4)
pub async fn prometheus_metrics_handler(
    headers: HeaderMap,
    State(server): State<Arc<GameServer>>,
) -> axum::response::Result<axum::response::Response> {
    use axum::http::header::{HeaderValue, CONTENT_TYPE};
    use axum::response::IntoResponse;

    if server.config.security.require_metrics_auth {
        enforce_metrics_auth(&headers, server.as_ref())?;
    }

    let snapshot = server.metrics.snapshot().await;
    let body = render_prometheus_metrics(&snapshot);
    let headers = [(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"))];
    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::Config;
    use crate::metrics::ServerMetrics;
    use crate::persistence::InMemoryResultsSink;

    fn test_server(metrics_auth_token: Option<&str>) -> Arc<GameServer> {
        let mut config = Config::default();
        config.security.require_metrics_auth = true;
        config.security.metrics_auth_token = metrics_auth_token.map(str::to_string);
        let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let metrics = Arc::new(ServerMetrics::new());
        let results_sink = Arc::new(InMemoryResultsSink::new());
        GameServer::new(config, cache, metrics, results_sink)
    }

    #[test]
    fn missing_header_rejected() {
        let server = test_server(Some("shared-token"));
        assert_eq!(enforce_metrics_auth(&HeaderMap::new(), &server).unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn correct_token_accepted() {
        let server = test_server(Some("shared-token"));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer shared-token".parse().unwrap());
        assert!(enforce_metrics_auth(&headers, &server).is_ok());
    }

    #[test]
    fn wrong_token_rejected() {
        let server = test_server(Some("correct-token"));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer wrong-token".parse().unwrap());
        assert_eq!(enforce_metrics_auth(&headers, &server).unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn non_bearer_scheme_rejected() {
        let server = test_server(Some("some-token"));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic some-token".parse().unwrap());
        assert_eq!(enforce_metrics_auth(&headers, &server).unwrap_err(), StatusCode::UNAUTHORIZED);
    }
}
