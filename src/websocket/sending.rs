use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

use crate::protocol::{ServerMessage, UserId};

/// Serializes `message` and writes it as a single text frame, bounded by
/// the write-deadline enforced by the caller.
pub(super) async fn send_text_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
    user_id: &UserId,
) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(%user_id, error = %err, "failed to serialize server message");
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await.map_err(|err| {
        tracing::debug!(%user_id, error = %err, "failed to write frame, connection closed");
    })
}
