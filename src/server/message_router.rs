//! Typed dispatch table: message type → handler. Default handlers are
//! `ping`→`pong` ([`super::heartbeat`]) and `echo`; everything else is
//! routed to the matching collaborator (rooms, matchmaker, match
//! controller). Handlers never block — gameplay input is handed straight
//! to the engine's input queue and this function returns immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::room_service::RoomServiceError;
use super::GameServer;
use crate::auth::AuthenticatedUser;
use crate::engine::EngineInput;
use crate::matchcontrol::{ControlEvent, MatchController, MatchError};
use crate::protocol::{ClientMessage, ErrorCode, MatchId, ServerMessage};

const RATE_LIMITED_ENDPOINTS_MAX_PER_MINUTE: u32 = 30;

impl GameServer {
    /// `Handle(conn, msg)`: unknown types are counted and answered with a
    /// structured `error` reply to the sender; everything else dispatches
    /// to its handler.
    pub(crate) async fn handle_client_message(self: &Arc<Self>, user: &AuthenticatedUser, message: ClientMessage) {
        self.metrics.increment_message_type(message_type_name(&message));

        match message {
            ClientMessage::Ping => self.handle_ping(&user.user_id).await,
            ClientMessage::Echo { message } => {
                self.send_to_user(&user.user_id, ServerMessage::Error {
                    message,
                    error_code: None,
                })
                .await;
            }
            ClientMessage::RoomJoin { room_name, max_size } => {
                self.handle_room_join(user, room_name, max_size).await;
            }
            ClientMessage::RoomLeave => self.handle_room_leave(user).await,
            ClientMessage::RoomMessage { data } => self.handle_room_message(user, data).await,
            ClientMessage::MatchmakingJoin => self.handle_matchmaking_join(user).await,
            ClientMessage::MatchmakingLeave => self.handle_matchmaking_leave(user).await,
            ClientMessage::MatchJoin { match_id } => self.handle_match_join(user, match_id).await,
            ClientMessage::PlayerInput { tick: _, up, down, left, right, shoot, aim_angle } => {
                self.send_engine_input(
                    user,
                    EngineInput::Move { up, down, left, right, shoot, aim_angle },
                )
                .await;
            }
            ClientMessage::Shoot { aim_angle, client_timestamp_ms } => {
                self.send_engine_input(user, EngineInput::Shoot { aim_angle, client_timestamp_ms }).await;
            }
            ClientMessage::CollectLoot { entity_id } => {
                self.send_engine_input(user, EngineInput::CollectLoot { entity_id }).await;
            }
            ClientMessage::SwitchWeapon { weapon } => {
                self.send_engine_input(user, EngineInput::SwitchWeapon { weapon }).await;
            }
        }
    }

    fn check_rate_limit(&self, user_id: &str, endpoint: &str) -> bool {
        self.cache.rate_limit(&user_id.to_string(), endpoint) <= RATE_LIMITED_ENDPOINTS_MAX_PER_MINUTE
    }

    async fn handle_room_join(self: &Arc<Self>, user: &AuthenticatedUser, room_name: String, max_size: Option<u32>) {
        if !self.check_rate_limit(&user.user_id, "room:join") {
            self.send_error_to_user(&user.user_id, "too many room joins", Some(ErrorCode::RateLimitExceeded)).await;
            return;
        }
        if let Err(reason) = crate::protocol::validation::validate_room_name_with_config(&room_name, &self.config.protocol) {
            self.send_error_to_user(&user.user_id, reason, Some(ErrorCode::InvalidRoomName)).await;
            return;
        }

        match self.rooms.join(&user.user_id, room_name, max_size).await {
            Ok(result) => {
                self.send_to_user(
                    &user.user_id,
                    ServerMessage::RoomJoined {
                        room_id: result.room_id,
                        room_name: result.room_name,
                        members: result.members,
                    },
                )
                .await;
                self.broadcast_room(
                    result.room_id,
                    ServerMessage::RoomMemberJoined { user_id: user.user_id.clone(), username: user.username.clone() },
                    Some(user.user_id.clone()),
                )
                .await;
            }
            Err(RoomServiceError::AlreadyInRoom) => {
                self.send_error_to_user(&user.user_id, "already in a room", Some(ErrorCode::AlreadyInRoom)).await;
            }
            Err(RoomServiceError::RoomFull) => {
                self.send_error_to_user(&user.user_id, "room is full", Some(ErrorCode::RoomFull)).await;
            }
            Err(RoomServiceError::NotInRoom) => unreachable!("join never returns NotInRoom"),
        }
    }

    async fn handle_room_leave(self: &Arc<Self>, user: &AuthenticatedUser) {
        match self.rooms.leave(&user.user_id).await {
            Ok(result) => {
                self.send_to_user(&user.user_id, ServerMessage::RoomLeft).await;
                if result.now_empty {
                    self.send_to_user(&user.user_id, ServerMessage::RoomClosed { room_id: result.room_id }).await;
                } else {
                    self.broadcast_room(
                        result.room_id,
                        ServerMessage::RoomMemberLeft { user_id: user.user_id.clone() },
                        None,
                    )
                    .await;
                }
            }
            Err(RoomServiceError::NotInRoom) => {
                self.send_error_to_user(&user.user_id, "not in a room", Some(ErrorCode::NotInRoom)).await;
            }
            Err(_) => unreachable!("leave never returns AlreadyInRoom/RoomFull"),
        }
    }

    async fn handle_room_message(self: &Arc<Self>, user: &AuthenticatedUser, data: serde_json::Value) {
        let Some(room_id) = self.rooms.current_room(&user.user_id) else {
            self.send_error_to_user(&user.user_id, "not in a room", Some(ErrorCode::NotInRoom)).await;
            return;
        };
        self.broadcast_room(
            room_id,
            ServerMessage::RoomMessage { from_user_id: user.user_id.clone(), data },
            None,
        )
        .await;
    }

    async fn handle_matchmaking_join(self: &Arc<Self>, user: &AuthenticatedUser) {
        if let Err(err) = self.matchmaker.join(user.user_id.clone(), None).await {
            tracing::warn!(user_id = %user.user_id, error = %err, "matchmaking join failed");
            self.send_error_to_user(&user.user_id, "could not join matchmaking", Some(ErrorCode::InternalError)).await;
            return;
        }
        self.send_to_user(&user.user_id, ServerMessage::MatchmakingJoined { queue_position: None }).await;
    }

    async fn handle_matchmaking_leave(self: &Arc<Self>, user: &AuthenticatedUser) {
        let _ = self.matchmaker.leave(&user.user_id).await;
        self.send_to_user(&user.user_id, ServerMessage::MatchmakingLeft).await;
    }

    async fn handle_match_join(self: &Arc<Self>, user: &AuthenticatedUser, match_id: MatchId) {
        let assignment = match self.cache.get_match_assignment(&user.user_id).await {
            Ok(Some(assignment)) if assignment.match_id == match_id => assignment,
            _ => {
                self.send_error_to_user(&user.user_id, "no assignment for this match", Some(ErrorCode::MatchNotJoinable)).await;
                return;
            }
        };

        let Some(controller) = self.matchmaker.active_match(&match_id) else {
            self.send_error_to_user(&user.user_id, "match not found", Some(ErrorCode::MatchNotFound)).await;
            return;
        };

        match controller.add_player(user.user_id.clone(), user.username.clone()).await {
            Ok(()) => {}
            Err(MatchError::DuplicatePlayer(_)) => {
                self.send_error_to_user(&user.user_id, "already joined this match", Some(ErrorCode::AlreadyInMatch)).await;
                return;
            }
            Err(_) => {
                self.send_error_to_user(&user.user_id, "match is no longer joinable", Some(ErrorCode::MatchNotJoinable)).await;
                return;
            }
        }

        self.send_to_user(
            &user.user_id,
            ServerMessage::MatchJoined { match_id, expected_players: assignment.player_count },
        )
        .await;

        spawn_match_forwarder(Arc::clone(self), user.user_id.clone(), Arc::clone(&controller));

        if controller.all_expected_joined(assignment.player_count) {
            let results_sink = self.matchmaker.results_sink();
            let guest_mmr = self.config.matchmaker.guest_mmr;
            match controller.start(results_sink, move |_| guest_mmr).await {
                Ok(()) => {
                    let tick_rate_hz = self.config.engine.tick_rate_hz;
                    for joined in controller.joined_user_ids().await {
                        self.send_to_user(&joined, ServerMessage::MatchStarted { match_id, tick_rate_hz }).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(%match_id, error = %err, "match failed to start");
                    for joined in controller.joined_user_ids().await {
                        self.send_error_to_user(&joined, "match failed to start", Some(ErrorCode::InternalError)).await;
                    }
                }
            }
        }
    }

    async fn send_engine_input(&self, user: &AuthenticatedUser, input: EngineInput) {
        let Ok(Some(assignment)) = self.cache.get_match_assignment(&user.user_id).await else {
            return;
        };
        let Some(controller) = self.matchmaker.active_match(&assignment.match_id) else {
            return;
        };
        controller.send_input(user.user_id.clone(), input).await;
    }
}

/// Forwards a match's snapshot/event broadcasts to one connection once the
/// engine has started, until the match finishes or the channel closes.
fn spawn_match_forwarder(server: Arc<GameServer>, user_id: crate::protocol::UserId, controller: Arc<MatchController>) {
    tokio::spawn(async move {
        let mut snapshots = loop {
            if let Some(rx) = controller.subscribe_snapshots().await {
                break rx;
            }
            if controller.phase().await == crate::protocol::MatchPhase::Finished {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        };
        let mut events = controller.subscribe_events().await;

        loop {
            tokio::select! {
                snapshot = snapshots.recv() => {
                    match snapshot {
                        Ok(snapshot) => {
                            server.send_to_user(&user_id, ServerMessage::GameState(Box::new(snapshot))).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                event = recv_event(&mut events) => {
                    match event {
                        Some(ControlEvent::MatchEnded { match_id, rankings }) => {
                            server.send_to_user(&user_id, ServerMessage::MatchEnded { match_id, rankings }).await;
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    });
}

async fn recv_event(events: &mut Option<broadcast::Receiver<ControlEvent>>) -> Option<ControlEvent> {
    match events {
        Some(rx) => match rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => None,
            Err(broadcast::error::RecvError::Closed) => None,
        },
        None => std::future::pending().await,
    }
}

fn message_type_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::Ping => "ping",
        ClientMessage::Echo { .. } => "echo",
        ClientMessage::RoomJoin { .. } => "room:join",
        ClientMessage::RoomLeave => "room:leave",
        ClientMessage::RoomMessage { .. } => "room:message",
        ClientMessage::MatchmakingJoin => "matchmaking:join",
        ClientMessage::MatchmakingLeave => "matchmaking:leave",
        ClientMessage::MatchJoin { .. } => "match:join",
        ClientMessage::PlayerInput { .. } => "player_input",
        ClientMessage::Shoot { .. } => "shoot",
        ClientMessage::CollectLoot { .. } => "collect_loot",
        ClientMessage::SwitchWeapon { .. } => "switch_weapon",
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
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn test_server() -> Arc<GameServer> {
        let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let metrics = Arc::new(ServerMetrics::new());
        let results_sink = Arc::new(InMemoryResultsSink::new());
        GameServer::new(Config::default(), cache, metrics, results_sink)
    }

    fn connected_user(server: &Arc<GameServer>, user_id: &str) -> (AuthenticatedUser, mpsc::Receiver<Arc<ServerMessage>>) {
        let (sender, receiver) = mpsc::channel(16);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        server
            .register_client(user_id.to_string(), user_id.to_string(), sender, addr, CancellationToken::new())
            .unwrap();
        (AuthenticatedUser { user_id: user_id.to_string(), username: user_id.to_string() }, receiver)
    }

    #[tokio::test]
    async fn ping_replies_with_pong() {
        let server = test_server();
        let (user, mut rx) = connected_user(&server, "u1");
        server.handle_client_message(&user, ClientMessage::Ping).await;
        assert!(matches!(*rx.recv().await.unwrap(), ServerMessage::Pong));
    }

    #[tokio::test]
    async fn room_join_then_second_member_notified() {
        let server = test_server();
        let (u1, mut rx1) = connected_user(&server, "u1");
        let (u2, mut rx2) = connected_user(&server, "u2");

        server.handle_client_message(&u1, ClientMessage::RoomJoin { room_name: "lobby".to_string(), max_size: None }).await;
        assert!(matches!(*rx1.recv().await.unwrap(), ServerMessage::RoomJoined { .. }));

        server.handle_client_message(&u2, ClientMessage::RoomJoin { room_name: "lobby".to_string(), max_size: None }).await;
        assert!(matches!(*rx2.recv().await.unwrap(), ServerMessage::RoomJoined { .. }));
        assert!(matches!(*rx1.recv().await.unwrap(), ServerMessage::RoomMemberJoined { .. }));
    }

    #[tokio::test]
    async fn room_join_twice_is_rejected() {
        let server = test_server();
        let (u1, mut rx1) = connected_user(&server, "u1");
        server.handle_client_message(&u1, ClientMessage::RoomJoin { room_name: "a".to_string(), max_size: None }).await;
        rx1.recv().await.unwrap();
        server.handle_client_message(&u1, ClientMessage::RoomJoin { room_name: "b".to_string(), max_size: None }).await;
        let reply = rx1.recv().await.unwrap();
        assert!(matches!(&*reply, ServerMessage::Error { error_code: Some(ErrorCode::AlreadyInRoom), .. }));
    }

    #[tokio::test]
    async fn matchmaking_join_then_leave() {
        let server = test_server();
        let (user, mut rx) = connected_user(&server, "u1");
        server.handle_client_message(&user, ClientMessage::MatchmakingJoin).await;
        assert!(matches!(*rx.recv().await.unwrap(), ServerMessage::MatchmakingJoined { .. }));
        server.handle_client_message(&user, ClientMessage::MatchmakingLeave).await;
        assert!(matches!(*rx.recv().await.unwrap(), ServerMessage::MatchmakingLeft));
    }

    #[tokio::test]
    async fn match_join_without_assignment_errors() {
        let server = test_server();
        let (user, mut rx) = connected_user(&server, "u1");
        server.handle_client_message(&user, ClientMessage::MatchJoin { match_id: MatchId::new_v4() }).await;
        let reply = rx.recv().await.unwrap();
        assert!(matches!(&*reply, ServerMessage::Error { error_code: Some(ErrorCode::MatchNotJoinable), .. }));
    }
}
