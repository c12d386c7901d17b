use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::cache::ServerCache;
use crate::config::Config;
use crate::matchmaking::Matchmaker;
use crate::metrics::ServerMetrics;
use crate::persistence::ResultsSink;
use crate::protocol::{RoomId, ServerMessage, UserId};

mod connection_manager;
mod heartbeat;
mod maintenance;
mod message_router;
mod messaging;
mod room_service;

use connection_manager::ConnectionManager;
pub(crate) use connection_manager::RegisterClientError;
use room_service::RoomRegistry;

/// Process-wide hub wiring together the connection registry, room
/// registry, matchmaker, cache and metrics. One instance per process,
/// shared via `Arc` with every connection task.
pub struct GameServer {
    pub(crate) connections: ConnectionManager,
    pub(crate) rooms: RoomRegistry,
    pub(crate) matchmaker: Arc<Matchmaker>,
    pub(crate) cache: Arc<dyn ServerCache>,
    pub(crate) metrics: Arc<ServerMetrics>,
    pub(crate) authenticator: Authenticator,
    pub(crate) config: Config,
}

impl GameServer {
    #[must_use]
    pub fn new(
        config: Config,
        cache: Arc<dyn ServerCache>,
        metrics: Arc<ServerMetrics>,
        results_sink: Arc<dyn ResultsSink>,
    ) -> Arc<Self> {
        let authenticator = Authenticator::new(config.security.token_secret.clone(), Arc::clone(&cache));
        let connections = ConnectionManager::new(config.security.max_connections_per_ip, Arc::clone(&metrics));
        let rooms = RoomRegistry::new(Arc::clone(&metrics));
        let matchmaker = Matchmaker::new(
            Arc::clone(&cache),
            config.matchmaker.clone(),
            config.engine.clone(),
            config.match_config.clone(),
            results_sink,
        );

        Arc::new(Self {
            connections,
            rooms,
            matchmaker,
            cache,
            metrics,
            authenticator,
            config,
        })
    }

    /// Spawns the matchmaker's background loop and the shared maintenance
    /// (reaper) task. Returns both join handles for shutdown bookkeeping.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let matchmaker_loop = self.matchmaker.spawn_loop();
        let maintenance_loop = maintenance::spawn(Arc::clone(self));
        (matchmaker_loop, maintenance_loop)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.connection_count()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Sends `message` to `user_id`'s connection if one exists, subject to
    /// the 5-second enqueue timeout. Drops and counts on timeout.
    pub(crate) async fn send_to_user(&self, user_id: &UserId, message: ServerMessage) {
        let Some(sender) = self.connections.sender(user_id) else {
            return;
        };
        let message = Arc::new(message);
        if tokio::time::timeout(Duration::from_secs(5), sender.send(message))
            .await
            .is_err()
        {
            self.metrics.increment_websocket_messages_dropped();
            tracing::warn!(%user_id, "send to user timed out, dropping message");
        }
    }

    /// Fire-and-forget broadcast to every member of `room_id` except
    /// `except`. Each send runs on its own task so one slow client can't
    /// stall the others.
    pub(crate) async fn broadcast_room(&self, room_id: RoomId, message: ServerMessage, except: Option<UserId>) {
        let Some(members) = self.rooms.members(&room_id).await else {
            return;
        };
        let message = Arc::new(message);
        for member in members {
            if except.as_ref() == Some(&member) {
                continue;
            }
            let Some(sender) = self.connections.sender(&member) else {
                continue;
            };
            let message = Arc::clone(&message);
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                if tokio::time::timeout(Duration::from_secs(5), sender.send(message))
                    .await
                    .is_err()
                {
                    metrics.increment_websocket_messages_dropped();
                }
            });
        }
    }

    /// Registers a newly authenticated client with a fresh cancellation
    /// signal. Evicts any prior connection for the same user.
    pub(crate) fn register_client(
        &self,
        user_id: UserId,
        username: String,
        sender: tokio::sync::mpsc::Sender<Arc<ServerMessage>>,
        client_addr: std::net::SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), RegisterClientError> {
        self.connections.register_client(user_id, username, sender, client_addr, cancel)
    }

    /// Removes a client's connection and detaches it from its room.
    /// Matches are left alone: the simulation continues to treat the
    /// player's entity normally until the match otherwise resolves.
    pub(crate) async fn disconnect_user(&self, user_id: &UserId) {
        self.connections.remove_client(user_id);
        if let Some(leave) = self.rooms.leave_all(user_id).await {
            self.broadcast_room(
                leave.room_id,
                ServerMessage::RoomMemberLeft { user_id: user_id.clone() },
                None,
            )
            .await;
        }
        let _ = self.matchmaker.leave(user_id).await;
    }
}
