use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthenticatedUser;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::server::GameServer;

use super::sending::send_text_message;

const READ_DEADLINE: Duration = Duration::from_secs(60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(25);
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Drives one already-authenticated connection: registers it, runs the
/// read and write loops concurrently, and tears it down when either ends.
pub(super) async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, addr: SocketAddr, user: AuthenticatedUser) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Arc<ServerMessage>>(OUTBOUND_QUEUE_CAPACITY);
    let cancel = CancellationToken::new();

    if let Err(err) = server.register_client(user.user_id.clone(), user.username.clone(), tx.clone(), addr, cancel.clone()) {
        tracing::warn!(user_id = %user.user_id, %err, "connection rejected");
        return;
    }
    tracing::info!(user_id = %user.user_id, client_addr = %addr, "websocket connection established");

    let _ = tx
        .send(Arc::new(ServerMessage::Authenticated { user_id: user.user_id.clone(), username: user.username.clone() }))
        .await;

    let write_cancel = cancel.clone();
    let write_user_id = user.user_id.clone();
    let write_task = tokio::spawn(async move { run_write_loop(sender, rx, write_cancel, write_user_id).await });

    let read_cancel = cancel.clone();
    let read_server = Arc::clone(&server);
    let read_user = user.clone();
    let read_task = tokio::spawn(async move { run_read_loop(receiver, read_server, read_user, read_cancel).await });

    tokio::select! {
        _ = write_task => {}
        _ = read_task => {}
    }

    cancel.cancel();
    server.disconnect_user(&user.user_id).await;
    tracing::info!(user_id = %user.user_id, "websocket connection closed");
}

async fn run_write_loop(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<ServerMessage>>,
    cancel: CancellationToken,
    user_id: crate::protocol::UserId,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ping_interval.tick() => {
                if tokio::time::timeout(WRITE_DEADLINE, sender.send(Message::Ping(Vec::new().into()))).await.is_err() {
                    break;
                }
            }
            message = rx.recv() => {
                let Some(message) = message else { break };
                match tokio::time::timeout(WRITE_DEADLINE, send_text_message(&mut sender, &message, &user_id)).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

async fn run_read_loop(
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    server: Arc<GameServer>,
    user: AuthenticatedUser,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = tokio::time::timeout(READ_DEADLINE, receiver.next()) => frame,
        };

        let Ok(Some(frame)) = frame else { break };
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(user_id = %user.user_id, error = %err, "websocket read error");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                if text.len() > server.config.security.max_message_size {
                    server
                        .send_error_to_user(&user.user_id, "message too large", Some(crate::protocol::ErrorCode::MessageTooLarge))
                        .await;
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => server.handle_client_message(&user, message).await,
                    Err(err) => {
                        tracing::debug!(user_id = %user.user_id, error = %err, "rejected malformed client frame");
                        server
                            .send_error_to_user(&user.user_id, "unrecognized message", Some(crate::protocol::ErrorCode::InvalidMessage))
                            .await;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::Config;
    use crate::metrics::ServerMetrics;
    use crate::persistence::InMemoryResultsSink;
    use crate::websocket::routes::create_router;
    use futures_util::SinkExt as _;
    use tokio_tungstenite::{connect_async, tungstenite::Message as TungsteniteMessage};

    fn test_server() -> Arc<GameServer> {
        let cache = Arc::new(InMemoryCache::new(7 * 24 * 60 * 60, 300));
        let metrics = Arc::new(ServerMetrics::new());
        let results_sink = Arc::new(InMemoryResultsSink::new());
        let mut config = Config::default();
        config.security.require_websocket_auth = false;
        GameServer::new(config, cache, metrics, results_sink)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn round_trips_a_ping() {
        let server = test_server();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = create_router(&server.config.security.cors_origins).with_state(server);
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        let url = format!("ws://{addr}/ws?token=guest");
        let (ws_stream, _) = connect_async(&url).await.expect("connects");
        let (mut write, mut read) = ws_stream.split();

        let authenticated = read.next().await.unwrap().unwrap();
        assert!(matches!(authenticated, TungsteniteMessage::Text(_)));

        write.send(TungsteniteMessage::Text(r#"{"type":"ping"}"#.to_string().into())).await.unwrap();
        let reply = read.next().await.unwrap().unwrap();
        let TungsteniteMessage::Text(text) = reply else { panic!("expected text frame") };
        assert!(text.contains("pong"));
    }
}
