use super::GameServer;
use crate::protocol::{ServerMessage, UserId};

impl GameServer {
    /// `ping` → record the liveness timestamp and reply `pong`.
    pub(crate) async fn handle_ping(&self, user_id: &UserId) {
        self.connections.record_ping(user_id);
        self.send_to_user(user_id, ServerMessage::Pong).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::Config;
    use crate::persistence::InMemoryResultsSink;
    use crate::metrics::ServerMetrics;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout, Duration};
    use tokio_util::sync::CancellationToken;

    fn test_server() -> Arc<GameServer> {
        let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let metrics = Arc::new(ServerMetrics::new());
        let results_sink = Arc::new(InMemoryResultsSink::new());
        GameServer::new(Config::default(), cache, metrics, results_sink)
    }

    #[tokio::test]
    async fn handle_ping_resets_timeout_and_replies() {
        let server = test_server();
        let (sender, mut receiver) = mpsc::channel(4);
        let addr: SocketAddr = "127.0.0.1:45000".parse().unwrap();

        server
            .register_client("u1".to_string(), "alice".to_string(), sender, addr, CancellationToken::new())
            .expect("registration succeeds");

        sleep(Duration::from_millis(25)).await;
        let expired_before = server.connections.collect_expired_clients(StdDuration::from_millis(5));
        assert_eq!(expired_before, vec!["u1".to_string()]);

        server.handle_ping(&"u1".to_string()).await;

        let msg = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("channel still open")
            .expect("message present");
        assert!(matches!(*msg, ServerMessage::Pong));

        let expired_after = server.connections.collect_expired_clients(StdDuration::from_millis(5));
        assert!(expired_after.is_empty(), "ping refresh clears the expiry");
    }
}
