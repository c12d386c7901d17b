//! Shared maintenance task: sweeps expired connections, idle rooms and
//! the cache's expired sessions/assignments/rate-limit windows. Grounded
//! on `cache::spawn_maintenance_task`'s `tokio::time::interval` loop.

use std::sync::Arc;
use std::time::Duration;

use super::GameServer;
use crate::protocol::ServerMessage;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const PING_TIMEOUT: Duration = Duration::from_secs(90);

/// Spawns the maintenance loop. Runs forever; callers keep the
/// `JoinHandle` for shutdown bookkeeping only.
pub(super) fn spawn(server: Arc<GameServer>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            server.reap_expired_connections().await;
            server.reap_idle_rooms().await;
            if let Err(err) = server.cache.sweep_expired().await {
                tracing::warn!(error = %err, "cache maintenance sweep failed");
            }
        }
    })
}

impl GameServer {
    async fn reap_expired_connections(&self) {
        let expired = self.connections.collect_expired_clients(PING_TIMEOUT);
        for user_id in expired {
            tracing::info!(%user_id, "disconnecting client for missed heartbeats");
            self.send_to_user(&user_id, ServerMessage::ForceDisconnect {
                reason: "heartbeat timeout".to_string(),
            })
            .await;
            self.disconnect_user(&user_id).await;
        }
    }

    async fn reap_idle_rooms(&self) {
        let empty_timeout = chrono::Duration::seconds(self.config.server.empty_room_timeout_secs as i64);
        let inactive_timeout = chrono::Duration::seconds(self.config.server.inactive_room_timeout_secs as i64);
        let removed = self.rooms.cleanup_empty(empty_timeout, inactive_timeout).await;
        if removed > 0 {
            tracing::debug!(removed, "reaped idle rooms");
        }
    }
}
