//! # docwire-protocol
//!
//! Wire protocol implementation for docwire.
//!
//! This crate provides:
//! - The fixed 16-byte message header and operation codes
//! - Payload encoding for insert, update, delete, query, get-more and kill-cursors
//! - Reply decoding into metadata plus raw document slices
//! - A thin BSON codec adapter and the protocol error type
//!
//! It performs no I/O; the client crate owns the byte stream.

pub mod codec;
pub mod error;
pub mod flags;
pub mod header;
pub mod message;
pub mod namespace;
pub mod opcode;
pub mod reply;

pub use error::ProtocolError;
pub use flags::{DeleteFlags, ResponseFlags, UpdateFlags};
pub use header::{MessageHeader, HEADER_SIZE};
pub use message::{encode_message, Request};
pub use namespace::Namespace;
pub use opcode::OpCode;
pub use reply::{encode_reply, Batch, Reply};

/// Default port of a document database server.
pub const DEFAULT_PORT: u16 = 27017;

/// Maximum size of a single message, header included (48 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 48 * 1024 * 1024;

/// Reserved collection that executes commands.
pub const COMMAND_COLLECTION: &str = "$cmd";
