//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::database::Database;
use crate::error::ClientError;
use crate::stream::Transport;
use std::sync::Arc;

/// High-level client for a document database server.
///
/// Cloning is cheap; every clone, and every database, collection and cursor
/// derived from it, shares the same connection.
#[derive(Debug, Clone)]
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Connects to the server.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let conn = Connection::connect(config).await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Wraps an already-established byte stream.
    pub fn from_stream(stream: impl Transport + 'static, config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::from_stream(stream, config)),
        }
    }

    /// Returns a handle to the named database. No request is sent.
    pub fn database(&self, name: &str) -> Result<Database, ClientError> {
        Database::new(self.conn.clone(), name)
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Returns whether an earlier failure made the connection unusable.
    pub fn is_broken(&self) -> bool {
        self.conn.is_broken()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }
}
