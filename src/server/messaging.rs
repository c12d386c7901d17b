use super::GameServer;
use crate::protocol::{ErrorCode, ServerMessage, UserId};

impl GameServer {
    /// Sends a structured `error` message to `user_id`.
    pub(crate) async fn send_error_to_user(
        &self,
        user_id: &UserId,
        message: impl Into<String>,
        error_code: Option<ErrorCode>,
    ) {
        self.send_to_user(
            user_id,
            ServerMessage::Error {
                message: message.into(),
                error_code,
            },
        )
        .await;
    }
}
