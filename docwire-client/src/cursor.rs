//! Server-side result set iteration.
//!
//! A cursor holds one batch of documents in memory. When the batch runs out
//! and the server still holds a cursor id, the next batch is fetched with
//! GET_MORE. The server cursor is released with KILL_CURSORS by
//! [`Cursor::close`]; dropping an open cursor leaks it until the server's idle
//! timeout and only logs a warning.

use crate::command;
use crate::connection::Connection;
use crate::error::ClientError;
use bson::Document;
use docwire_protocol::{Namespace, Reply, Request};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Where a cursor stands relative to its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Unread documents remain in the local batch.
    OpenWithBuffer,
    /// Local batch consumed, server cursor still open.
    OpenNeedsFetch,
    /// No data left locally or on the server.
    Exhausted,
    /// Closed by the caller.
    Closed,
}

/// A pull-based iterator over a query result.
pub struct Cursor {
    conn: Arc<Connection>,
    namespace: Namespace,
    cursor_id: i64,
    position: usize,
    batch: Vec<Document>,
    closed: bool,
}

impl Cursor {
    /// Builds a cursor from the reply to a QUERY.
    pub(crate) async fn from_reply(
        conn: Arc<Connection>,
        namespace: Namespace,
        reply: Reply,
    ) -> Result<Self, ClientError> {
        let mut cursor = Self {
            conn,
            namespace,
            cursor_id: 0,
            position: 0,
            batch: Vec::new(),
            closed: false,
        };
        cursor.absorb(reply).await?;
        Ok(cursor)
    }

    pub fn state(&self) -> CursorState {
        if self.closed {
            CursorState::Closed
        } else if self.position < self.batch.len() {
            CursorState::OpenWithBuffer
        } else if self.cursor_id != 0 {
            CursorState::OpenNeedsFetch
        } else {
            CursorState::Exhausted
        }
    }

    /// Server cursor id; 0 once exhausted or closed.
    pub fn id(&self) -> i64 {
        self.cursor_id
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Number of unread documents in the local batch.
    pub fn buffered(&self) -> usize {
        self.batch.len() - self.position
    }

    /// Returns the current document without advancing.
    pub async fn peek(&mut self) -> Result<Option<&Document>, ClientError> {
        if self.state() == CursorState::OpenNeedsFetch {
            self.get_more(0).await?;
        }
        if self.closed {
            return Ok(None);
        }
        Ok(self.batch.get(self.position))
    }

    /// Returns the current document and advances past it.
    pub async fn next(&mut self) -> Result<Option<Document>, ClientError> {
        if self.peek().await?.is_none() {
            return Ok(None);
        }
        let doc = std::mem::take(&mut self.batch[self.position]);
        self.position += 1;
        Ok(Some(doc))
    }

    /// Like [`Cursor::next`], deserializing the document into `T`.
    pub async fn next_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ClientError> {
        match self.next().await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Returns whether another document is available, fetching at most one
    /// batch to find out.
    pub async fn has_more(&mut self) -> Result<bool, ClientError> {
        match self.state() {
            CursorState::OpenWithBuffer => Ok(true),
            CursorState::Exhausted | CursorState::Closed => Ok(false),
            CursorState::OpenNeedsFetch => {
                self.get_more(0).await?;
                Ok(self.state() == CursorState::OpenWithBuffer)
            }
        }
    }

    /// Fetches the next batch, replacing the local one. A `number_to_return`
    /// of 0 lets the server pick the batch size.
    pub async fn get_more(&mut self, number_to_return: i32) -> Result<(), ClientError> {
        if self.cursor_id == 0 || self.closed {
            return Err(ClientError::NoCursor);
        }
        tracing::debug!(
            "Fetching more from cursor {} on {}",
            self.cursor_id,
            self.namespace
        );

        let reply = self
            .conn
            .round_trip(&Request::GetMore {
                namespace: &self.namespace,
                number_to_return,
                cursor_id: self.cursor_id,
            })
            .await?;
        self.absorb(reply).await
    }

    /// Releases the server cursor. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.closed = true;
        self.batch.clear();
        self.position = 0;
        self.kill().await
    }

    /// Reads every remaining document.
    pub async fn collect_all(&mut self) -> Result<Vec<Document>, ClientError> {
        let mut documents = Vec::new();
        while let Some(doc) = self.next().await? {
            documents.push(doc);
        }
        Ok(documents)
    }

    /// Sends KILL_CURSORS for the current id, zeroing it first.
    async fn kill(&mut self) -> Result<(), ClientError> {
        let id = std::mem::take(&mut self.cursor_id);
        if id == 0 {
            return Ok(());
        }
        tracing::debug!("Killing cursor {} on {}", id, self.namespace);
        self.conn
            .send(&Request::KillCursors { cursor_ids: &[id] })
            .await?;
        Ok(())
    }

    /// Replaces the local batch with the documents of `reply`.
    async fn absorb(&mut self, reply: Reply) -> Result<(), ClientError> {
        self.batch.clear();
        self.position = 0;

        if reply.flags.is_cursor_not_found() {
            let id = std::mem::take(&mut self.cursor_id);
            return Err(ClientError::CursorNotFound(id));
        }

        let query_failed = reply.flags.is_query_failure();
        self.cursor_id = reply.cursor_id;
        let batch = reply.into_batch::<Document>();

        if query_failed {
            self.cursor_id = 0;
            return Err(command::query_failure(batch.documents));
        }

        match batch.error {
            None => {
                self.batch = batch.documents;
                Ok(())
            }
            Some(source) => {
                tracing::debug!(
                    "Batch from {} decoded partially ({} documents): {}",
                    self.namespace,
                    batch.documents.len(),
                    source
                );
                if let Err(e) = self.kill().await {
                    tracing::warn!("Failed to kill cursor after partial batch: {}", e);
                }
                Err(ClientError::PartialBatch {
                    documents: batch.documents,
                    source,
                })
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.cursor_id != 0 {
            tracing::warn!(
                "Cursor {} on {} dropped while open; server resource leaked until idle timeout",
                self.cursor_id,
                self.namespace
            );
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("namespace", &self.namespace)
            .field("cursor_id", &self.cursor_id)
            .field("position", &self.position)
            .field("buffered", &self.buffered())
            .field("closed", &self.closed)
            .finish()
    }
}
