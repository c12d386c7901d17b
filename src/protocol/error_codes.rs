use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling, grouped the way the wire
/// protocol groups them: authentication, validation, conflict, resource
/// exhaustion, external I/O, and fatal/internal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors
    Unauthorized,
    InvalidToken,
    TokenExpired,
    AuthenticationRequired,
    AuthenticationTimeout,

    // Validation errors
    InvalidInput,
    InvalidUsername,
    InvalidRoomName,
    InvalidMessage,
    MessageTooLarge,

    // Conflict errors
    AlreadyInRoom,
    NotInRoom,
    AlreadyInQueue,
    NotInQueue,
    AlreadyInMatch,
    NotInMatch,
    PlayerAlreadyConnected,
    MatchNotJoinable,

    // Resource exhaustion
    RoomFull,
    RoomNotFound,
    QueueClosed,
    RateLimitExceeded,
    TooManyConnections,

    // External I/O
    PersistenceUnavailable,
    MatchNotFound,

    // Fatal / internal
    InternalError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unauthorized => {
                "Access denied. Authentication credentials are missing or invalid."
            }
            Self::InvalidToken => {
                "The authentication token is invalid or malformed. Please obtain a new token."
            }
            Self::TokenExpired => {
                "The authentication token has expired. Please re-authenticate."
            }
            Self::AuthenticationRequired => {
                "This operation requires authentication. Send an auth message first."
            }
            Self::AuthenticationTimeout => {
                "Authentication took too long to complete. Please reconnect and try again."
            }
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::InvalidUsername => {
                "The username is invalid. Usernames must be non-empty and meet length requirements."
            }
            Self::InvalidRoomName => {
                "The room name is invalid or malformed."
            }
            Self::InvalidMessage => {
                "The message could not be parsed or is not valid for the current state."
            }
            Self::MessageTooLarge => {
                "The message size exceeds the maximum allowed limit."
            }
            Self::AlreadyInRoom => {
                "You are already in a room. Leave the current room before joining another."
            }
            Self::NotInRoom => {
                "You are not currently in any room."
            }
            Self::AlreadyInQueue => {
                "You are already in the matchmaking queue."
            }
            Self::NotInQueue => {
                "You are not currently in the matchmaking queue."
            }
            Self::AlreadyInMatch => {
                "You are already assigned to a match."
            }
            Self::NotInMatch => {
                "You are not currently assigned to any match."
            }
            Self::PlayerAlreadyConnected => {
                "This account is already connected from another session."
            }
            Self::MatchNotJoinable => {
                "The match is no longer accepting players."
            }
            Self::RoomFull => {
                "The room has reached its maximum capacity."
            }
            Self::RoomNotFound => {
                "The requested room could not be found. It may have been closed."
            }
            Self::QueueClosed => {
                "Matchmaking is not currently accepting new entries."
            }
            Self::RateLimitExceeded => {
                "Too many requests in a short time. Please slow down and try again later."
            }
            Self::TooManyConnections => {
                "Too many active connections. Close some before opening new ones."
            }
            Self::PersistenceUnavailable => {
                "Match results could not be recorded, but the match itself is unaffected."
            }
            Self::MatchNotFound => {
                "The requested match could not be found. It may have already ended."
            }
            Self::InternalError => {
                "An internal server error occurred. Please try again."
            }
            Self::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again in a few moments."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_error_codes_have_nonempty_descriptions() {
        let codes = [
            ErrorCode::Unauthorized,
            ErrorCode::InvalidToken,
            ErrorCode::TokenExpired,
            ErrorCode::AuthenticationRequired,
            ErrorCode::AuthenticationTimeout,
            ErrorCode::InvalidInput,
            ErrorCode::InvalidUsername,
            ErrorCode::InvalidRoomName,
            ErrorCode::InvalidMessage,
            ErrorCode::MessageTooLarge,
            ErrorCode::AlreadyInRoom,
            ErrorCode::NotInRoom,
            ErrorCode::AlreadyInQueue,
            ErrorCode::NotInQueue,
            ErrorCode::AlreadyInMatch,
            ErrorCode::NotInMatch,
            ErrorCode::PlayerAlreadyConnected,
            ErrorCode::MatchNotJoinable,
            ErrorCode::RoomFull,
            ErrorCode::RoomNotFound,
            ErrorCode::QueueClosed,
            ErrorCode::RateLimitExceeded,
            ErrorCode::TooManyConnections,
            ErrorCode::PersistenceUnavailable,
            ErrorCode::MatchNotFound,
            ErrorCode::InternalError,
            ErrorCode::ServiceUnavailable,
        ];
        for code in &codes {
            assert!(!code.description().is_empty());
            assert!(code.description().len() > 10);
        }
    }

    #[test]
    fn display_uses_description() {
        let error = ErrorCode::RoomNotFound;
        assert_eq!(format!("{error}"), error.description());
    }

    #[test]
    fn serialization_is_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RoomNotFound).unwrap();
        assert_eq!(json, "\"ROOM_NOT_FOUND\"");
    }
}
