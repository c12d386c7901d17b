use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::{extract_token, AuthenticatedUser};
use crate::protocol::{is_guest, GUEST_ID_PREFIX};
use crate::server::GameServer;

use super::connection::handle_socket;

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Authenticates the upgrade request before handing off to the socket. A
/// failed or missing token refuses the upgrade with 401 and never opens a
/// connection, per the registry's single-connection invariant.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<GameServer>>,
    Query(query): Query<WebSocketQuery>,
    headers: HeaderMap,
) -> Response {
    let auth_header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = extract_token(query.token.as_deref(), auth_header);

    let user = match token {
        Some(token) => match server.authenticator.authenticate(&token).await {
            Ok(user) => user,
            Err(err) => {
                tracing::debug!(%err, "websocket upgrade rejected: invalid token");
                return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
            }
        },
        None if server.config.security.require_websocket_auth => {
            return (StatusCode::UNAUTHORIZED, "missing token").into_response();
        }
        None => AuthenticatedUser {
            user_id: format!("{GUEST_ID_PREFIX}{}", uuid::Uuid::new_v4()),
            username: "guest".to_string(),
        },
    };
    debug_assert!(is_guest(&user.user_id) || !user.user_id.is_empty());

    ws.on_upgrade(move |socket| handle_socket(socket, server, addr, user))
}
