//! Client error types.

use thiserror::Error;
use twine_protocol::{ApplicationException, MessageKind, ProtocolError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("application exception: {0}")]
    Application(ApplicationException),

    #[error("read timeout")]
    Timeout,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("connection broken by an earlier failure")]
    ConnectionBroken,

    #[error("client closed")]
    Closed,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("reply sequence id {got} does not match request {expected}")]
    SequenceMismatch { expected: i32, got: i32 },

    #[error("reply has unexpected message kind: {0}")]
    InvalidReply(MessageKind),
}

impl ClientError {
    /// Returns whether this error poisons the connection for all further
    /// traffic. Application exceptions are part of normal two-way call
    /// semantics; everything else leaves the stream in an untrusted state.
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(self, ClientError::Application(_))
    }
}
