//! Shared error type across undercover crates.

use thiserror::Error;

use crate::protocol::{RequestTag, Stage};

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Action not accepted in the current stage.
    WrongStage,
    /// Caller lacks permission (e.g. non-admin attempting an admin action).
    NotAllowed,
    /// Game data failed validation.
    InvalidData,
    /// Speech out of turn.
    NotYourTurn,
    /// No room with that id.
    RoomNotFound,
    /// Room mailbox full.
    RoomBusy,
    /// Gave up waiting for an acknowledgement.
    Timeout,
    /// Room answered the join with an error or an unexpected message.
    JoinRejected,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::WrongStage => "WRONG_STAGE",
            ClientCode::NotAllowed => "NOT_ALLOWED",
            ClientCode::InvalidData => "INVALID_DATA",
            ClientCode::NotYourTurn => "NOT_YOUR_TURN",
            ClientCode::RoomNotFound => "ROOM_NOT_FOUND",
            ClientCode::RoomBusy => "ROOM_BUSY",
            ClientCode::Timeout => "TIMEOUT",
            ClientCode::JoinRejected => "JOIN_REJECTED",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, UndercoverError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum UndercoverError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{action} is not accepted during {stage}")]
    WrongStage { stage: Stage, action: RequestTag },
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("it is not your turn to speak")]
    NotYourTurn,
    #[error("room not found: {0}")]
    RoomNotFound(String),
    #[error("room busy, try again later")]
    RoomBusy,
    #[error("timed out waiting for join acknowledgement")]
    JoinTimeout,
    #[error("join rejected: {0}")]
    JoinRejected(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl UndercoverError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            UndercoverError::BadRequest(_) => ClientCode::BadRequest,
            UndercoverError::WrongStage { .. } => ClientCode::WrongStage,
            UndercoverError::NotAllowed(_) => ClientCode::NotAllowed,
            UndercoverError::InvalidData(_) => ClientCode::InvalidData,
            UndercoverError::NotYourTurn => ClientCode::NotYourTurn,
            UndercoverError::RoomNotFound(_) => ClientCode::RoomNotFound,
            UndercoverError::RoomBusy => ClientCode::RoomBusy,
            UndercoverError::JoinTimeout => ClientCode::Timeout,
            UndercoverError::JoinRejected(_) => ClientCode::JoinRejected,
            UndercoverError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            UndercoverError::Internal(_) => ClientCode::Internal,
        }
    }

    /// True for errors caused by the caller's action being invalid in the
    /// current game state. These never affect session state.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            UndercoverError::WrongStage { .. }
                | UndercoverError::NotAllowed(_)
                | UndercoverError::InvalidData(_)
                | UndercoverError::NotYourTurn
        )
    }
}
