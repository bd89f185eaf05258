//! Command reply classification.
//!
//! Commands are queries against `<db>.$cmd` returning one document. A
//! document carrying a non-null `$err` field is a server-side failure.

use crate::connection::Connection;
use crate::error::ClientError;
use bson::{Bson, Document};
use docwire_protocol::codec::encode_document;
use docwire_protocol::{Namespace, Request};

/// Message used when `$err` holds something other than a string.
pub const NON_STRING_ERROR: &str = "non-string error message";

/// Message used when a reply flagged as a query failure has no `$err`.
pub const QUERY_FAILURE: &str = "query failure";

const ERROR_KEY: &str = "$err";

/// Sends `command` to `namespace` (a `<db>.$cmd` namespace) and returns
/// the classified first reply document.
pub(crate) async fn run(
    conn: &Connection,
    namespace: &Namespace,
    command: &Document,
) -> Result<Document, ClientError> {
    let query = encode_document(command)?;
    let reply = conn
        .round_trip(&Request::Query {
            namespace,
            number_to_skip: 0,
            number_to_return: 1,
            query: &query,
            field_selector: None,
        })
        .await?;

    let query_failed = reply.flags.is_query_failure();
    let batch = reply.into_batch::<Document>();
    if query_failed {
        return Err(query_failure(batch.documents));
    }

    let doc = batch
        .into_result()?
        .into_iter()
        .next()
        .ok_or(ClientError::EmptyReply)?;
    classify_reply(doc)
}

/// Extracts the server error message, if the document carries one.
pub fn error_message(doc: &Document) -> Option<String> {
    match doc.get(ERROR_KEY) {
        None | Some(Bson::Null) => None,
        Some(Bson::String(message)) => Some(message.clone()),
        Some(_) => Some(NON_STRING_ERROR.to_string()),
    }
}

/// Builds the error for a reply carrying the query-failure flag from its
/// first document.
pub(crate) fn query_failure(documents: Vec<Document>) -> ClientError {
    match documents.into_iter().next() {
        Some(doc) => {
            let message = error_message(&doc).unwrap_or_else(|| QUERY_FAILURE.to_string());
            tracing::debug!("Query failed: {}", message);
            ClientError::Server { message }
        }
        None => ClientError::EmptyReply,
    }
}

/// Turns a `$err` document into [`ClientError::Server`]; passes anything
/// else through.
pub fn classify_reply(doc: Document) -> Result<Document, ClientError> {
    match error_message(&doc) {
        Some(message) => {
            tracing::debug!("Server returned error: {}", message);
            Err(ClientError::Server { message })
        }
        None => Ok(doc),
    }
}

/// Reads a numeric field that servers report as double, int32 or int64.
pub fn get_count(doc: &Document, key: &str) -> Result<i64, ClientError> {
    match doc.get(key) {
        Some(Bson::Double(n)) => Ok(*n as i64),
        Some(Bson::Int32(n)) => Ok(i64::from(*n)),
        Some(Bson::Int64(n)) => Ok(*n),
        Some(_) => Err(ClientError::Access {
            key: key.to_string(),
            source: bson::document::ValueAccessError::UnexpectedType,
        }),
        None => Err(ClientError::Access {
            key: key.to_string(),
            source: bson::document::ValueAccessError::NotPresent,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockReply};
    use bson::doc;

    #[test]
    fn test_string_error() {
        let result = classify_reply(doc! { "$err": "bad syntax" });
        match result {
            Err(ClientError::Server { message }) => assert_eq!(message, "bad syntax"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_string_error() {
        let result = classify_reply(doc! { "$err": 17, "code": 10 });
        match result {
            Err(ClientError::Server { message }) => assert_eq!(message, NON_STRING_ERROR),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_absent_or_null_error_is_success() {
        let doc = classify_reply(doc! { "ok": 1.0 }).unwrap();
        assert_eq!(doc, doc! { "ok": 1.0 });

        let doc = classify_reply(doc! { "$err": Bson::Null, "ok": 1.0 }).unwrap();
        assert_eq!(doc.get_f64("ok").unwrap(), 1.0);
    }

    #[test]
    fn test_query_failure_message() {
        match query_failure(vec![doc! { "$err": "unauthorized" }]) {
            ClientError::Server { message } => assert_eq!(message, "unauthorized"),
            other => panic!("unexpected error: {:?}", other),
        }
        match query_failure(vec![doc! { "ok": 0.0 }]) {
            ClientError::Server { message } => assert_eq!(message, QUERY_FAILURE),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(query_failure(vec![]), ClientError::EmptyReply));
    }

    #[tokio::test]
    async fn test_flagged_command_reply_without_err_fails() {
        let (client, _server) =
            mock::spawn(|_| MockReply::documents(vec![doc! { "ok": 0.0 }]).with_flags(2));
        let db = client.database("test").unwrap();

        match db.command(doc! { "ping": 1 }).await {
            Err(ClientError::Server { message }) => assert_eq!(message, QUERY_FAILURE),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!client.is_broken());
    }

    #[test]
    fn test_get_count_accepts_numeric_types() {
        assert_eq!(get_count(&doc! { "n": 3.0 }, "n").unwrap(), 3);
        assert_eq!(get_count(&doc! { "n": 4 }, "n").unwrap(), 4);
        assert_eq!(get_count(&doc! { "n": 5i64 }, "n").unwrap(), 5);
        assert!(matches!(
            get_count(&doc! { "n": "x" }, "n"),
            Err(ClientError::Access { .. })
        ));
        assert!(matches!(
            get_count(&doc! {}, "n"),
            Err(ClientError::Access { .. })
        ));
    }
}
