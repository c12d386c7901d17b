use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;

use crate::config::Config;
use crate::server::GameServer;

use super::handler::websocket_handler;
use super::metrics::{metrics_handler, prometheus_metrics_handler};

/// Builds the Axum router: `/ws` upgrade, `/health`, `/metrics`,
/// `/metrics/prom`.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<GameServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins.split(',').filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok()).collect();
        if origins.is_empty() {
            tracing::warn!("no valid CORS origins configured, falling back to permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prom", get(prometheus_metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(server): State<Arc<GameServer>>) -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "ok",
        "connections": server.connection_count(),
        "rooms": server.room_count(),
    }))
}

/// Builds the `GameServer`, spawns its background tasks, and serves the
/// router until the listener closes. Binds over TLS when the `tls`
/// feature is enabled and `security.transport.tls.enabled` is set.
pub async fn run_server(addr: SocketAddr, config: Config) -> anyhow::Result<()> {
    let cache: Arc<dyn crate::cache::ServerCache> = Arc::new(crate::cache::InMemoryCache::new(7 * 24 * 60 * 60, 300));
    let metrics = Arc::new(crate::metrics::ServerMetrics::new());
    let results_sink: Arc<dyn crate::persistence::ResultsSink> = Arc::new(crate::persistence::InMemoryResultsSink::new());

    let cors_origins = config.security.cors_origins.clone();
    #[cfg(feature = "tls")]
    let tls_config = config.security.transport.clone();
    let server = GameServer::new(config, cache, metrics, results_sink);
    server.spawn_background_tasks();

    let app = create_router(&cors_origins).with_state(server);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    #[cfg(feature = "tls")]
    if tls_config.tls.enabled {
        let rustls_config = crate::security::build_rustls_config(&tls_config.tls)
            .map_err(|err| anyhow::anyhow!("failed to initialize TLS configuration: {err}"))?;
        tracing::info!(%addr, "tank royale server listening over HTTPS");
        axum_server::bind_rustls(addr, rustls_config).serve(make_service).await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tank royale server listening");
    axum::serve(listener, make_service).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::metrics::ServerMetrics;
    use crate::persistence::InMemoryResultsSink;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_server() -> Arc<GameServer> {
        let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let metrics = Arc::new(ServerMetrics::new());
        let results_sink = Arc::new(InMemoryResultsSink::new());
        GameServer::new(Config::default(), cache, metrics, results_sink)
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let server = test_server();
        let app = create_router("*").with_state(server);
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
