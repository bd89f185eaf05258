//! # docwire-client
//!
//! Client library for docwire.
//!
//! This crate provides:
//! - Async TCP connection with sequential request/reply framing
//! - Database and collection handles for writes, queries and commands
//! - Query modifiers and validated field projections
//! - Cursors that stream result batches with GET_MORE and release them with
//!   KILL_CURSORS
//!
//! There is no pooling, retry or reconnection. After a transport or protocol
//! failure the connection reports itself broken and the caller re-dials.

pub mod client;
pub mod collection;
pub mod command;
pub mod connection;
pub mod cursor;
pub mod database;
pub mod error;
pub mod query;
pub mod stream;

#[cfg(test)]
mod mock;

pub use client::Client;
pub use collection::Collection;
pub use connection::{Connection, ConnectionConfig};
pub use cursor::{Cursor, CursorState};
pub use database::{Database, DatabaseStats};
pub use error::{ClientError, ErrorKind};
pub use query::{Projection, Query};
pub use stream::Transport;

pub use bson;
