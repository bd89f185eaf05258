//! Collection handle: writes, queries and collection-level commands.

use crate::command;
use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::ClientError;
use crate::query::{Projection, Query};
use bson::{doc, Bson, Document};
use docwire_protocol::codec::encode_document;
use docwire_protocol::{DeleteFlags, Namespace, Request, UpdateFlags, COMMAND_COLLECTION};
use serde::Serialize;
use std::sync::Arc;

const INDEX_COLLECTION: &str = "system.indexes";

/// A collection within a database.
#[derive(Debug, Clone)]
pub struct Collection {
    conn: Arc<Connection>,
    namespace: Namespace,
    command_namespace: Namespace,
}

impl Collection {
    pub(crate) fn new(
        conn: Arc<Connection>,
        database: &str,
        name: &str,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            conn,
            namespace: Namespace::new(database, name)?,
            command_namespace: Namespace::new(database, COMMAND_COLLECTION)?,
        })
    }

    pub fn name(&self) -> &str {
        self.namespace.collection()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts one document. No acknowledgement is requested.
    pub async fn insert<T: Serialize>(&self, document: &T) -> Result<(), ClientError> {
        let document = encode_document(document)?;
        self.conn
            .send(&Request::Insert {
                namespace: &self.namespace,
                document: &document,
            })
            .await?;
        Ok(())
    }

    /// Updates the first document matching `selector`.
    pub async fn update(&self, selector: &Document, update: &Document) -> Result<(), ClientError> {
        self.write_update(selector, update, UpdateFlags::new()).await
    }

    /// Updates the first match, inserting when nothing matches.
    pub async fn upsert(&self, selector: &Document, update: &Document) -> Result<(), ClientError> {
        self.write_update(selector, update, UpdateFlags::new().with_upsert())
            .await
    }

    /// Updates every matching document.
    pub async fn update_all(
        &self,
        selector: &Document,
        update: &Document,
    ) -> Result<(), ClientError> {
        self.write_update(selector, update, UpdateFlags::new().with_multi())
            .await
    }

    pub async fn upsert_all(
        &self,
        selector: &Document,
        update: &Document,
    ) -> Result<(), ClientError> {
        let flags = UpdateFlags::new().with_upsert().with_multi();
        self.write_update(selector, update, flags).await
    }

    async fn write_update(
        &self,
        selector: &Document,
        update: &Document,
        flags: UpdateFlags,
    ) -> Result<(), ClientError> {
        let selector = encode_document(selector)?;
        let update = encode_document(update)?;
        self.conn
            .send(&Request::Update {
                namespace: &self.namespace,
                flags,
                selector: &selector,
                update: &update,
            })
            .await?;
        Ok(())
    }

    /// Removes every document matching `selector`.
    pub async fn remove(&self, selector: &Document) -> Result<(), ClientError> {
        self.write_delete(selector, DeleteFlags::new()).await
    }

    /// Removes the first document matching `selector`.
    pub async fn remove_first(&self, selector: &Document) -> Result<(), ClientError> {
        self.write_delete(selector, DeleteFlags::new().with_single_remove())
            .await
    }

    async fn write_delete(&self, selector: &Document, flags: DeleteFlags) -> Result<(), ClientError> {
        let selector = encode_document(selector)?;
        self.conn
            .send(&Request::Delete {
                namespace: &self.namespace,
                flags,
                selector: &selector,
            })
            .await?;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Runs a query and returns a cursor over its first batch.
    ///
    /// `fields` is validated before anything is sent. A `number_to_return`
    /// of 0 lets the server choose the batch size.
    pub async fn query(
        &self,
        query: impl Into<Query>,
        fields: Option<Document>,
        number_to_skip: i32,
        number_to_return: i32,
    ) -> Result<Cursor, ClientError> {
        let projection = fields.map(Projection::new).transpose()?;
        let query = encode_document(query.into().as_document())?;
        let fields = projection
            .map(|p| encode_document(p.as_document()))
            .transpose()?;

        let reply = self
            .conn
            .round_trip(&Request::Query {
                namespace: &self.namespace,
                number_to_skip,
                number_to_return,
                query: &query,
                field_selector: fields.as_deref(),
            })
            .await?;
        Cursor::from_reply(self.conn.clone(), self.namespace.clone(), reply).await
    }

    pub async fn find(&self, query: impl Into<Query>) -> Result<Cursor, ClientError> {
        self.query(query, None, 0, 0).await
    }

    pub async fn find_fields(
        &self,
        query: impl Into<Query>,
        fields: Document,
    ) -> Result<Cursor, ClientError> {
        self.query(query, Some(fields), 0, 0).await
    }

    pub async fn find_all(&self) -> Result<Cursor, ClientError> {
        self.find(Document::new()).await
    }

    /// Returns the first matching document, if any.
    pub async fn find_one(&self, query: impl Into<Query>) -> Result<Option<Document>, ClientError> {
        self.first(query, None).await
    }

    pub async fn find_one_fields(
        &self,
        query: impl Into<Query>,
        fields: Document,
    ) -> Result<Option<Document>, ClientError> {
        self.first(query, Some(fields)).await
    }

    async fn first(
        &self,
        query: impl Into<Query>,
        fields: Option<Document>,
    ) -> Result<Option<Document>, ClientError> {
        let mut cursor = self.query(query, fields, 0, 1).await?;
        let result = cursor.next().await;
        cursor.close().await?;
        result
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Counts documents matching `query` (all documents when `None`).
    pub async fn count(&self, query: Option<Document>) -> Result<i64, ClientError> {
        let mut cmd = doc! { "count": self.name() };
        if let Some(query) = query {
            cmd.insert("query", query);
        }
        let reply = command::run(&self.conn, &self.command_namespace, &cmd).await?;
        command::get_count(&reply, "n")
    }

    /// Drops the collection and its indexes.
    pub async fn drop(&self) -> Result<Document, ClientError> {
        tracing::debug!("Dropping collection {}", self.namespace);
        let cmd = doc! { "drop": self.name() };
        command::run(&self.conn, &self.command_namespace, &cmd).await
    }

    /// Creates an index on `keys` and returns its generated name.
    pub async fn ensure_index(&self, keys: Document, unique: bool) -> Result<String, ClientError> {
        let name = index_name(&keys);
        let spec = doc! {
            "name": name.as_str(),
            "ns": self.namespace.to_string(),
            "key": keys,
            "unique": unique,
        };
        let indexes = Namespace::new(self.namespace.database(), INDEX_COLLECTION)?;
        let document = encode_document(&spec)?;
        self.conn
            .send(&Request::Insert {
                namespace: &indexes,
                document: &document,
            })
            .await?;
        Ok(name)
    }

    pub async fn drop_index(&self, name: &str) -> Result<Document, ClientError> {
        self.delete_indexes(name).await
    }

    /// Drops every index except the one on `_id`.
    pub async fn drop_indexes(&self) -> Result<Document, ClientError> {
        self.delete_indexes("*").await
    }

    async fn delete_indexes(&self, index: &str) -> Result<Document, ClientError> {
        let cmd = doc! { "deleteIndexes": self.name(), "index": index };
        command::run(&self.conn, &self.command_namespace, &cmd).await
    }
}

/// `{ a: 1, b: -1 }` becomes `a_1_b_-1`.
fn index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(key, value)| {
            let direction = match value {
                Bson::Int32(n) => n.to_string(),
                Bson::Int64(n) => n.to_string(),
                Bson::Double(n) => n.to_string(),
                Bson::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}_{}", key, direction)
        })
        .collect::<Vec<_>>()
        .join("_")
}
