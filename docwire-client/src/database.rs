//! Database handle and database-level commands.

use crate::collection::Collection;
use crate::command;
use crate::connection::Connection;
use crate::error::ClientError;
use bson::{doc, Bson, Document, JavaScriptCodeWithScope};
use docwire_protocol::{Namespace, COMMAND_COLLECTION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage statistics reported by `dbstats`.
///
/// Servers report sizes as either integers or doubles, so every figure is
/// read as `f64`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseStats {
    pub db: Option<String>,
    pub collections: f64,
    pub objects: f64,
    pub avg_obj_size: f64,
    pub data_size: f64,
    pub storage_size: f64,
    pub num_extents: f64,
    pub indexes: f64,
    pub index_size: f64,
    pub ok: f64,
}

/// A database on the server.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Connection>,
    command_namespace: Namespace,
}

impl Database {
    pub(crate) fn new(conn: Arc<Connection>, name: &str) -> Result<Self, ClientError> {
        Ok(Self {
            conn,
            command_namespace: Namespace::new(name, COMMAND_COLLECTION)?,
        })
    }

    pub fn name(&self) -> &str {
        self.command_namespace.database()
    }

    pub fn collection(&self, name: &str) -> Result<Collection, ClientError> {
        Collection::new(self.conn.clone(), self.name(), name)
    }

    /// Runs a command and returns its reply document.
    pub async fn command(&self, command: Document) -> Result<Document, ClientError> {
        tracing::debug!("Running command on {}: {}", self.name(), command);
        command::run(&self.conn, &self.command_namespace, &command).await
    }

    /// Runs a command and deserializes its reply into `T`.
    pub async fn command_as<T: DeserializeOwned>(&self, command: Document) -> Result<T, ClientError> {
        let reply = self.command(command).await?;
        Ok(bson::from_document(reply)?)
    }

    pub async fn drop(&self) -> Result<Document, ClientError> {
        self.command(doc! { "dropDatabase": 1 }).await
    }

    pub async fn repair(&self) -> Result<Document, ClientError> {
        self.command(doc! { "repairDatabase": 1 }).await
    }

    pub async fn stats(&self) -> Result<DatabaseStats, ClientError> {
        self.command_as(doc! { "dbstats": 1 }).await
    }

    /// Evaluates JavaScript on the server and returns its `retval`.
    pub async fn eval(&self, code: &str, args: Vec<Bson>) -> Result<Bson, ClientError> {
        let mut reply = self
            .command(doc! {
                "$eval": Bson::JavaScriptCode(code.to_string()),
                "args": args,
            })
            .await?;
        reply.remove("retval").ok_or_else(|| ClientError::Access {
            key: "retval".into(),
            source: bson::document::ValueAccessError::NotPresent,
        })
    }

    /// Like [`Database::eval`] with variables bound in `scope`.
    pub async fn eval_with_scope(
        &self,
        code: &str,
        scope: Document,
        args: Vec<Bson>,
    ) -> Result<Bson, ClientError> {
        let code = JavaScriptCodeWithScope {
            code: code.to_string(),
            scope,
        };
        let mut reply = self
            .command(doc! {
                "$eval": Bson::JavaScriptCodeWithScope(code),
                "args": args,
            })
            .await?;
        reply.remove("retval").ok_or_else(|| ClientError::Access {
            key: "retval".into(),
            source: bson::document::ValueAccessError::NotPresent,
        })
    }
}
