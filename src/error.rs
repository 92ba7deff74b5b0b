//! Error types for the chat relay
//!
//! Defines application-level errors and inbox delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (session termination) and
/// protocol errors (reported to the sender as a text line).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal)
    #[error("Line framing error: {0}")]
    Framing(#[from] tokio_util::codec::AnyDelimiterCodecError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Every generated name is currently in use (fatal for the new connection)
    #[error("No display names left")]
    NamesExhausted,

    /// Configuration rejected at build time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Join target does not exist
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Create target already exists
    #[error("Room already exists: {0}")]
    RoomExists(String),

    /// Room name is empty, too long or contains whitespace
    #[error("Invalid room name: {0}")]
    InvalidRoomName(String),

    /// Join target is the current room
    #[error("Already in room: {0}")]
    AlreadyInRoom(String),

    /// Private message recipient is not a member of the sender's room
    #[error("Recipient not in room: {0}")]
    RecipientNotFound(String),

    /// Rename target is held by another session
    #[error("Name taken: {0}")]
    NameTaken(String),

    /// Display name is empty, too long or malformed
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Command word not recognised
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command or private message is missing its argument
    #[error("Missing argument, usage: {0}")]
    MissingArgument(&'static str),

    /// Inbound line exceeded the configured maximum length
    #[error("Line too long")]
    LineTooLong,
}

impl AppError {
    /// Whether this error ends the session
    ///
    /// Everything else is reported back to the sender and the session continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Io(_)
                | AppError::Framing(_)
                | AppError::ChannelSend
                | AppError::NamesExhausted
                | AppError::InvalidConfig(_)
        )
    }
}

/// Inbox delivery errors
///
/// Occurs when writing a line into a session's bounded inbox.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The inbox stayed full for the whole delivery timeout
    #[error("Delivery timed out")]
    TimedOut,
}

impl From<SendError> for AppError {
    fn from(_: SendError) -> Self {
        AppError::ChannelSend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AppError::ChannelSend.is_fatal());
        assert!(AppError::NamesExhausted.is_fatal());
        assert!(AppError::Io(std::io::Error::other("reset")).is_fatal());

        assert!(!AppError::RoomNotFound("x".into()).is_fatal());
        assert!(!AppError::UnknownCommand("x".into()).is_fatal());
        assert!(!AppError::LineTooLong.is_fatal());
    }

    #[test]
    fn test_send_error_is_fatal_app_error() {
        let err: AppError = SendError::ChannelClosed.into();
        assert!(err.is_fatal());
    }
}
