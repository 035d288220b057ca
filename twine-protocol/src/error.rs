//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding TWP messages.
///
/// `Incomplete` is the only recoverable variant: it means the input buffer
/// ends before the current message does, and the caller should read more
/// bytes and re-parse from the start of the message. Every other variant is
/// fatal to the message being decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("incomplete message: need {needed} more bytes")]
    Incomplete { needed: usize },

    #[error("unknown wire type code: {0:#x}")]
    UnknownTypeCode(u8),

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(u8),

    #[error("bad protocol version: {0:#x}")]
    BadVersion(u32),

    #[error("bad compact protocol id: {0:#x}")]
    BadProtocolId(u8),

    #[error("negative size: {0}")]
    NegativeSize(i64),

    #[error("size limit exceeded: {size} bytes (max {max})")]
    SizeLimit { size: usize, max: usize },

    #[error("varint exceeds maximum encoded length")]
    VarintOverflow,

    #[error("nesting depth limit exceeded")]
    DepthLimit,

    #[error("unbalanced nesting: {0}")]
    UnbalancedNesting(&'static str),

    #[error("invalid boolean byte: {0:#x}")]
    InvalidBool(u8),

    #[error("wire type not encodable in this protocol: {0}")]
    UnsupportedType(&'static str),

    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected JSON value: expected {expected}, got {got}")]
    UnexpectedJson {
        expected: &'static str,
        got: String,
    },
}

impl ProtocolError {
    /// Returns whether the decode can succeed once more input arrives.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::Incomplete { .. })
    }
}
