use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::ServerMetrics;
use crate::protocol::{ServerMessage, UserId};

#[derive(Debug, Clone)]
pub(crate) struct ClientConnection {
    pub username: String,
    pub last_ping: Instant,
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub client_addr: SocketAddr,
    pub cancel: CancellationToken,
}

#[derive(Debug, Error)]
pub enum RegisterClientError {
    #[error("Too many connections from your IP ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
}

/// Process-wide `UserId → Connection` registry enforcing per-IP connection
/// caps and the single-connection-per-user invariant: admitting a new
/// connection for an already-registered user forcibly closes the previous
/// one rather than rejecting the new one.
pub(crate) struct ConnectionManager {
    clients: DashMap<UserId, ClientConnection>,
    connections_per_ip: DashMap<IpAddr, usize>,
    metrics: Arc<ServerMetrics>,
    max_connections_per_ip: usize,
}

impl ConnectionManager {
    pub fn new(max_connections_per_ip: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            connections_per_ip: DashMap::new(),
            metrics,
            max_connections_per_ip,
        }
    }

    /// Registers a newly authenticated client, evicting any previous
    /// connection for `user_id`. Still rejects connections past the
    /// per-IP cap.
    pub fn register_client(
        &self,
        user_id: UserId,
        username: String,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), RegisterClientError> {
        if let Some((_, old)) = self.clients.remove(&user_id) {
            old.cancel.cancel();
            self.release_ip_slot(old.client_addr.ip());
            self.metrics.decrement_active_connections();
            info!(%user_id, "evicted previous connection for user");
        }

        let ip = client_addr.ip();
        if let Err(current) = self.try_reserve_ip_slot(ip) {
            return Err(RegisterClientError::IpLimitExceeded {
                current,
                limit: self.max_connections_per_ip,
            });
        }

        let connection = ClientConnection {
            username,
            last_ping: Instant::now(),
            sender,
            client_addr,
            cancel,
        };

        self.clients.insert(user_id.clone(), connection);
        self.metrics.increment_connections();
        info!(%user_id, %client_addr, "client registered");
        Ok(())
    }

    pub fn record_ping(&self, user_id: &UserId) {
        if let Some(mut client) = self.clients.get_mut(user_id) {
            client.last_ping = Instant::now();
        }
    }

    pub fn has_client(&self, user_id: &UserId) -> bool {
        self.clients.contains_key(user_id)
    }

    pub fn sender(&self, user_id: &UserId) -> Option<mpsc::Sender<Arc<ServerMessage>>> {
        self.clients.get(user_id).map(|client| client.sender.clone())
    }

    pub fn remove_client(&self, user_id: &UserId) -> Option<ClientConnection> {
        self.clients.remove(user_id).map(|(_, connection)| {
            self.release_ip_slot(connection.client_addr.ip());
            self.metrics.decrement_active_connections();
            connection
        })
    }

    pub fn collect_expired_clients(&self, ping_timeout: std::time::Duration) -> Vec<UserId> {
        let now = Instant::now();
        self.clients
            .iter()
            .filter_map(|entry| {
                if now.duration_since(entry.last_ping) > ping_timeout {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<usize, usize> {
        match self.connections_per_ip.entry(ip) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if current >= self.max_connections_per_ip {
                    Err(current)
                } else {
                    let count = entry.get_mut();
                    *count += 1;
                    Ok(*count)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                if self.max_connections_per_ip == 0 {
                    Err(0)
                } else {
                    entry.insert(1);
                    Ok(1)
                }
            }
        }
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        // Entry API keeps the read-modify-write atomic: a remove-then-insert
        // race here would either underflow the counter or leak a slot.
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) =
            self.connections_per_ip.entry(ip)
        {
            if *entry.get() > 1 {
                *entry.get_mut() -= 1;
            } else {
                entry.remove();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn make_manager(max_connections_per_ip: usize) -> ConnectionManager {
        ConnectionManager::new(max_connections_per_ip, Arc::new(ServerMetrics::new()))
    }

    fn channel() -> (
        mpsc::Sender<Arc<ServerMessage>>,
        mpsc::Receiver<Arc<ServerMessage>>,
    ) {
        mpsc::channel(4)
    }

    #[test]
    fn register_client_enforces_ip_limits_and_releases_on_remove() {
        let manager = make_manager(1);
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        let (tx1, _rx1) = channel();
        manager
            .register_client("u1".to_string(), "alice".to_string(), tx1, addr, CancellationToken::new())
            .expect("first registration succeeds");

        let (tx2, _rx2) = channel();
        let err = manager
            .register_client("u2".to_string(), "bob".to_string(), tx2, addr, CancellationToken::new())
            .expect_err("second client hits per-IP limit");
        assert!(matches!(err, RegisterClientError::IpLimitExceeded { current: 1, limit: 1 }));

        manager.remove_client(&"u1".to_string());

        let (tx3, _rx3) = channel();
        manager
            .register_client("u3".to_string(), "carol".to_string(), tx3, addr, CancellationToken::new())
            .expect("registrations resume after slot release");
    }

    #[test]
    fn register_client_evicts_previous_connection_for_same_user() {
        let manager = make_manager(4);
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();

        let (tx1, _rx1) = channel();
        let old_cancel = CancellationToken::new();
        manager
            .register_client("dupe".to_string(), "alice".to_string(), tx1, addr, old_cancel.clone())
            .unwrap();
        assert!(!old_cancel.is_cancelled());

        let (tx2, _rx2) = channel();
        manager
            .register_client("dupe".to_string(), "alice-2".to_string(), tx2, addr, CancellationToken::new())
            .expect("second connection for same user evicts the first");
        assert!(old_cancel.is_cancelled(), "evicted connection's cancel token fires");
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ip_slot_reservation() {
        let manager = Arc::new(make_manager(5));
        let addr: SocketAddr = "10.0.0.1:9000".parse().unwrap();

        let task_count = 20;
        let barrier = Arc::new(tokio::sync::Barrier::new(task_count));
        let mut handles = Vec::with_capacity(task_count);

        for i in 0..task_count {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                let (tx, _rx) = channel();
                manager.register_client(
                    format!("user-{i}"),
                    format!("user-{i}"),
                    tx,
                    addr,
                    CancellationToken::new(),
                )
            }));
        }

        let mut successes = 0usize;
        let mut failures = 0usize;
        for handle in handles {
            match handle.await.expect("task should not panic") {
                Ok(()) => successes += 1,
                Err(_) => failures += 1,
            }
        }

        assert_eq!(successes, 5, "exactly 5 should succeed");
        assert_eq!(failures, 15, "15 should be rejected");
    }

    #[tokio::test]
    async fn test_concurrent_release_ip_slot_no_underflow() {
        let manager = Arc::new(make_manager(10));

        for i in 0..3u16 {
            let (tx, _rx) = channel();
            let port_addr: SocketAddr = format!("10.0.0.3:{}", 9000 + i).parse().unwrap();
            manager
                .register_client(
                    format!("ip-user-{i}"),
                    format!("ip-user-{i}"),
                    tx,
                    port_addr,
                    CancellationToken::new(),
                )
                .expect("registration should succeed");
        }

        let barrier = Arc::new(tokio::sync::Barrier::new(3));
        let mut handles = Vec::new();
        for i in 0..3u16 {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                manager.remove_client(&format!("ip-user-{i}"));
            }));
        }

        for handle in handles {
            handle.await.expect("task should not panic");
        }

        for i in 0..10u16 {
            let (tx, _rx) = channel();
            let port_addr: SocketAddr = format!("10.0.0.3:{}", 8000 + i).parse().unwrap();
            let result = manager.register_client(
                format!("fresh-{i}"),
                format!("fresh-{i}"),
                tx,
                port_addr,
                CancellationToken::new(),
            );
            assert!(result.is_ok(), "registration #{} should succeed (no underflow)", i + 1);
        }
    }
}
