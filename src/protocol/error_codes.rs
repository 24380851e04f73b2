use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidInput,
    InvalidRoomCode,
    InvalidPlayerName,
    InvalidMaxPlayers,
    MessageTooLarge,

    // Room errors
    RoomNotFound,
    RoomFull,
    AlreadyInRoom,
    NotInRoom,
    RoomCreationFailed,
    GameAlreadyStarted,
    GameNotStarted,
    NotHost,

    // Phase errors
    WrongPhase,
    NotFrozen,

    // Reconnection errors
    RejoinFailed,
    RejoinExpired,
    PlayerAlreadyConnected,

    // Server errors
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::InvalidRoomCode => {
                "The room code is invalid or malformed. Room codes look like MAZXXXX."
            }
            Self::InvalidPlayerName => {
                "The player name is invalid. Names must be non-empty and within the length limit."
            }
            Self::InvalidMaxPlayers => {
                "The requested player count is outside the allowed range for a room."
            }
            Self::MessageTooLarge => "The message exceeds the maximum allowed size.",
            Self::RoomNotFound => "No room exists with the given code.",
            Self::RoomFull => "The room has reached its maximum player count.",
            Self::AlreadyInRoom => "You are already in a room. Leave it before joining another.",
            Self::NotInRoom => "This operation requires being in a room.",
            Self::RoomCreationFailed => "The server could not create a room. Please try again.",
            Self::GameAlreadyStarted => "The game in this room has already started.",
            Self::GameNotStarted => "The game in this room has not started yet.",
            Self::NotHost => "Only the room host can perform this operation.",
            Self::WrongPhase => "This operation is not valid in the current game phase.",
            Self::NotFrozen => "The unfreeze quiz is only available while frozen.",
            Self::RejoinFailed => "Reconnection failed. The room or player record was not found.",
            Self::RejoinExpired => "The reconnection grace period has expired.",
            Self::PlayerAlreadyConnected => "This player is already connected to the room.",
            Self::InternalError => "An internal server error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
