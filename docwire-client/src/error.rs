//! Client error types.

use bson::document::ValueAccessError;
use bson::Document;
use docwire_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection unusable after an earlier transport or protocol failure")]
    ConnectionBroken,

    #[error("request timeout")]
    Timeout,

    #[error("reply answers request id={actual}, expected id={expected}")]
    ResponseMismatch { expected: i32, actual: i32 },

    #[error("server error: {message}")]
    Server { message: String },

    #[error("reply contained no document")]
    EmptyReply,

    #[error("cursor {0} not found on server")]
    CursorNotFound(i64),

    #[error("batch decoded partially ({} documents): {source}", .documents.len())]
    PartialBatch {
        documents: Vec<Document>,
        #[source]
        source: ProtocolError,
    },

    #[error("failed to deserialize document: {0}")]
    Deserialize(#[from] bson::de::Error),

    #[error("field '{key}': {source}")]
    Access {
        key: String,
        #[source]
        source: ValueAccessError,
    },

    #[error("projection mixes inclusion and exclusion at key '{key}'")]
    InvalidProjection { key: String },

    #[error("cursor has no server-side id")]
    NoCursor,
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte stream failed; the connection must be re-dialed.
    Transport,
    /// The server sent something this client cannot parse.
    Protocol,
    /// A document failed to encode or decode.
    Codec,
    /// The server answered with `$err`.
    Server,
    /// The caller broke an API precondition; nothing was sent.
    Contract,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Io(_)
            | ClientError::ConnectionClosed
            | ClientError::ConnectionBroken
            | ClientError::Timeout => ErrorKind::Transport,
            ClientError::Protocol(ProtocolError::InvalidNamespace(_)) => ErrorKind::Contract,
            ClientError::Protocol(err) if err.is_codec() => ErrorKind::Codec,
            ClientError::Protocol(_)
            | ClientError::ResponseMismatch { .. }
            | ClientError::EmptyReply
            | ClientError::CursorNotFound(_) => ErrorKind::Protocol,
            ClientError::PartialBatch { .. }
            | ClientError::Deserialize(_)
            | ClientError::Access { .. } => ErrorKind::Codec,
            ClientError::Server { .. } => ErrorKind::Server,
            ClientError::InvalidProjection { .. } | ClientError::NoCursor => ErrorKind::Contract,
        }
    }

    /// Returns whether the connection can no longer be trusted after this
    /// error. Nothing in the client retries; the caller must re-dial.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            ClientError::CursorNotFound(_) | ClientError::EmptyReply => false,
            ClientError::Protocol(ProtocolError::MessageTooLarge { .. }) => false,
            other => matches!(other.kind(), ErrorKind::Transport | ErrorKind::Protocol),
        }
    }
}
