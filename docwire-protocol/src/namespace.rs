//! Fully-qualified collection names.

use crate::error::ProtocolError;
use bytes::BufMut;
use std::fmt;

/// A `database.collection` pair as written on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    database: String,
    collection: String,
}

impl Namespace {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let database = database.into();
        let collection = collection.into();

        if database.is_empty() {
            return Err(ProtocolError::InvalidNamespace("database name is empty".into()));
        }
        if database.contains('.') {
            return Err(ProtocolError::InvalidNamespace(format!(
                "database name '{}' contains '.'",
                database
            )));
        }
        if collection.is_empty() {
            return Err(ProtocolError::InvalidNamespace(
                "collection name is empty".into(),
            ));
        }
        if database.contains('\0') || collection.contains('\0') {
            return Err(ProtocolError::InvalidNamespace(
                "name contains a NUL byte".into(),
            ));
        }

        Ok(Self {
            database,
            collection,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Length of the zero-terminated wire form.
    pub fn wire_len(&self) -> usize {
        self.database.len() + 1 + self.collection.len() + 1
    }

    /// Writes `database "." collection "\0"`.
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.database.as_bytes());
        buf.put_u8(b'.');
        buf.put_slice(self.collection.as_bytes());
        buf.put_u8(0);
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_wire_form() {
        let ns = Namespace::new("app", "users").unwrap();
        let mut buf = BytesMut::new();
        ns.put(&mut buf);

        assert_eq!(&buf[..], b"app.users\0");
        assert_eq!(ns.wire_len(), buf.len());
        assert_eq!(ns.to_string(), "app.users");
    }

    #[test]
    fn test_collection_may_contain_dots() {
        let ns = Namespace::new("app", "system.indexes").unwrap();
        assert_eq!(ns.collection(), "system.indexes");
    }

    #[test]
    fn test_invalid_names() {
        assert!(Namespace::new("", "users").is_err());
        assert!(Namespace::new("a.b", "users").is_err());
        assert!(Namespace::new("app", "").is_err());
        assert!(Namespace::new("app", "us\0ers").is_err());
    }
}
