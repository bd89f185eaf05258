//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding requests or decoding replies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected opcode: expected {expected}, got {actual}")]
    UnexpectedOpCode { expected: i32, actual: i32 },

    #[error("unknown opcode: {0}")]
    UnknownOpCode(i32),

    #[error("truncated message at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid message length: {0}")]
    InvalidMessageLength(i32),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: u32 },

    #[error("invalid document length {length} at offset {offset}")]
    InvalidDocumentLength { offset: usize, length: i32 },

    #[error("negative document count: {0}")]
    NegativeDocumentCount(i32),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("BSON encode error: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("failed to decode document {index} at offset {offset}: {source}")]
    Document {
        index: usize,
        offset: usize,
        #[source]
        source: bson::de::Error,
    },
}

impl ProtocolError {
    /// Returns whether this error came from the document codec rather than
    /// from the message framing itself.
    pub fn is_codec(&self) -> bool {
        matches!(self, ProtocolError::Encode(_) | ProtocolError::Document { .. })
    }
}
