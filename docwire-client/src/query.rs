//! Query documents and field projections.
//!
//! A plain query is sent as its predicate document. Once a modifier is
//! applied the predicate moves under `$query` and modifiers sit beside it:
//!
//! ```text
//! { age: { $gt: 20 } }                            plain
//! { $query: { age: { $gt: 20 } }, $orderby: {..} } complex
//! ```

use crate::error::ClientError;
use bson::{Bson, Document};

const QUERY_KEY: &str = "$query";

/// A query predicate with optional modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    doc: Document,
}

impl Query {
    pub fn new(predicate: Document) -> Self {
        Self { doc: predicate }
    }

    /// Returns whether the predicate has been moved under `$query`.
    pub fn is_complex(&self) -> bool {
        self.doc.contains_key(QUERY_KEY)
    }

    /// The predicate, wherever it currently lives.
    pub fn predicate(&self) -> &Document {
        match self.doc.get_document(QUERY_KEY) {
            Ok(inner) => inner,
            Err(_) => &self.doc,
        }
    }

    /// The document as it goes on the wire.
    pub fn as_document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Asks the server for the query plan instead of results.
    pub fn explain(&mut self) -> &mut Self {
        self.set_modifier("$explain", true)
    }

    /// Forces use of an index, given by name or key pattern.
    pub fn hint(&mut self, index: impl Into<Bson>) -> &mut Self {
        self.set_modifier("$hint", index)
    }

    /// Inclusive lower index bound.
    pub fn min_key(&mut self, bound: Document) -> &mut Self {
        self.set_modifier("$min", bound)
    }

    /// Exclusive upper index bound.
    pub fn max_key(&mut self, bound: Document) -> &mut Self {
        self.set_modifier("$max", bound)
    }

    /// Limits the number of documents the server scans.
    pub fn max_scan(&mut self, count: i32) -> &mut Self {
        self.set_modifier("$maxScan", count)
    }

    pub fn show_disk_location(&mut self) -> &mut Self {
        self.set_modifier("$showDiskLoc", true)
    }

    pub fn snapshot(&mut self) -> &mut Self {
        self.set_modifier("$snapshot", true)
    }

    /// Orders results by the given key pattern.
    pub fn sort(&mut self, order: Document) -> &mut Self {
        self.set_modifier("$orderby", order)
    }

    fn set_modifier(&mut self, key: &str, value: impl Into<Bson>) -> &mut Self {
        self.complexify();
        self.doc.insert(key, value);
        self
    }

    /// Moves every current key under `$query`, once.
    fn complexify(&mut self) {
        if self.is_complex() {
            return;
        }
        let predicate = std::mem::take(&mut self.doc);
        self.doc.insert(QUERY_KEY, predicate);
    }
}

impl From<Document> for Query {
    fn from(predicate: Document) -> Self {
        Self::new(predicate)
    }
}

/// A validated field selector.
///
/// Every key other than `_id` must agree: either all included (any value
/// but `false` or numeric zero) or all excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    fields: Document,
}

impl Projection {
    pub fn new(fields: Document) -> Result<Self, ClientError> {
        let mut mode = None;
        for (key, value) in &fields {
            if key == "_id" {
                continue;
            }
            let included = is_truthy(value);
            match mode {
                None => mode = Some(included),
                Some(expected) if expected != included => {
                    return Err(ClientError::InvalidProjection { key: key.clone() });
                }
                Some(_) => {}
            }
        }
        Ok(Self { fields })
    }

    /// Selects only the given fields (plus `_id`, which the server adds).
    pub fn include<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut fields = Document::new();
        for key in keys {
            fields.insert(key, 1);
        }
        Self { fields }
    }

    pub fn as_document(&self) -> &Document {
        &self.fields
    }

    pub fn into_document(self) -> Document {
        self.fields
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}
