use std::net::SocketAddr;
use std::sync::Arc;

use tank_royale_server::cache::InMemoryCache;
use tank_royale_server::config::Config;
use tank_royale_server::metrics::ServerMetrics;
use tank_royale_server::persistence::InMemoryResultsSink;
use tank_royale_server::server::GameServer;
use tank_royale_server::websocket::create_router;

/// Builds a `GameServer` with in-memory backends and guest auth enabled,
/// binds it on an ephemeral port, and serves it in the background.
#[allow(dead_code)]
pub async fn start_test_server() -> SocketAddr {
    let mut config = Config::default();
    config.security.require_websocket_auth = false;
    start_test_server_with_config(config).await
}

#[allow(dead_code)]
pub async fn start_test_server_with_config(config: Config) -> SocketAddr {
    let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
    let metrics = Arc::new(ServerMetrics::new());
    let results_sink = Arc::new(InMemoryResultsSink::new());
    let cors_origins = config.security.cors_origins.clone();
    let server = GameServer::new(config, cache, metrics, results_sink);
    server.spawn_background_tasks();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(&cors_origins).with_state(server);

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    addr
}
