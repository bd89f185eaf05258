//! In-memory server for client tests.
//!
//! The server runs on the far end of a `tokio::io::duplex` pipe, records
//! every request it receives and answers QUERY / GET_MORE through a handler
//! closure. [`MemoryStore`] is a handler that keeps inserted documents so
//! tests can exercise whole write-then-read scenarios.

use crate::client::Client;
use crate::connection::ConnectionConfig;
use bson::{Bson, Document};
use bytes::{Buf, Bytes};
use docwire_protocol::codec::encode_document;
use docwire_protocol::{encode_reply, MessageHeader, OpCode, ResponseFlags, HEADER_SIZE};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct Received {
    pub request_id: i32,
    pub op_code: OpCode,
    pub payload: Bytes,
}

fn get_cstring(buf: &mut Bytes) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap();
    let s = String::from_utf8(buf[..end].to_vec()).unwrap();
    buf.advance(end + 1);
    s
}

fn get_document(buf: &mut Bytes) -> Document {
    let len = i32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
    let doc = bson::from_slice(&buf[..len]).unwrap();
    buf.advance(len);
    doc
}

impl Received {
    pub fn namespace(&self) -> String {
        let mut buf = self.payload.clone();
        match self.op_code {
            OpCode::KillCursors => String::new(),
            _ => {
                buf.advance(4);
                get_cstring(&mut buf)
            }
        }
    }

    /// `(namespace, skip, number_to_return, query, fields)`
    pub fn query(&self) -> (String, i32, i32, Document, Option<Document>) {
        assert_eq!(self.op_code, OpCode::Query);
        let mut buf = self.payload.clone();
        assert_eq!(buf.get_i32_le(), 0);
        let ns = get_cstring(&mut buf);
        let skip = buf.get_i32_le();
        let number_to_return = buf.get_i32_le();
        let query = get_document(&mut buf);
        let fields = buf.has_remaining().then(|| get_document(&mut buf));
        (ns, skip, number_to_return, query, fields)
    }

    /// `(namespace, number_to_return, cursor_id)`
    pub fn get_more(&self) -> (String, i32, i64) {
        assert_eq!(self.op_code, OpCode::GetMore);
        let mut buf = self.payload.clone();
        buf.advance(4);
        let ns = get_cstring(&mut buf);
        (ns, buf.get_i32_le(), buf.get_i64_le())
    }

    pub fn kill_cursor_ids(&self) -> Vec<i64> {
        assert_eq!(self.op_code, OpCode::KillCursors);
        let mut buf = self.payload.clone();
        buf.advance(4);
        let count = buf.get_i32_le();
        (0..count).map(|_| buf.get_i64_le()).collect()
    }

    /// `(namespace, document)`
    pub fn insert(&self) -> (String, Document) {
        assert_eq!(self.op_code, OpCode::Insert);
        let mut buf = self.payload.clone();
        buf.advance(4);
        let ns = get_cstring(&mut buf);
        (ns, get_document(&mut buf))
    }

    /// `(namespace, flags, selector, update)`
    pub fn update(&self) -> (String, i32, Document, Document) {
        assert_eq!(self.op_code, OpCode::Update);
        let mut buf = self.payload.clone();
        buf.advance(4);
        let ns = get_cstring(&mut buf);
        let flags = buf.get_i32_le();
        let selector = get_document(&mut buf);
        (ns, flags, selector, get_document(&mut buf))
    }

    /// `(namespace, flags, selector)`
    pub fn delete(&self) -> (String, i32, Document) {
        assert_eq!(self.op_code, OpCode::Delete);
        let mut buf = self.payload.clone();
        buf.advance(4);
        let ns = get_cstring(&mut buf);
        let flags = buf.get_i32_le();
        (ns, flags, get_document(&mut buf))
    }
}

/// What the server answers to a QUERY or GET_MORE.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub flags: i32,
    pub cursor_id: i64,
    pub op_code: i32,
    pub documents: Vec<Vec<u8>>,
}

impl MockReply {
    pub fn documents(docs: Vec<Document>) -> Self {
        Self::raw(docs.iter().map(|d| encode_document(d).unwrap()).collect())
    }

    pub fn raw(documents: Vec<Vec<u8>>) -> Self {
        Self {
            flags: 0,
            cursor_id: 0,
            op_code: OpCode::Reply.as_i32(),
            documents,
        }
    }

    pub fn with_cursor(mut self, cursor_id: i64) -> Self {
        self.cursor_id = cursor_id;
        self
    }

    pub fn with_flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_op_code(mut self, op_code: i32) -> Self {
        self.op_code = op_code;
        self
    }

    fn encode(&self, response_to: i32) -> Vec<u8> {
        let mut msg = encode_reply(
            1,
            response_to,
            ResponseFlags::from_bits(self.flags),
            self.cursor_id,
            0,
            &self.documents,
        )
        .unwrap();
        msg[12..16].copy_from_slice(&self.op_code.to_le_bytes());
        msg.to_vec()
    }
}

/// Handle to a running mock server.
pub struct MockServer {
    handle: JoinHandle<Vec<Received>>,
}

impl MockServer {
    /// Waits for the client side to hang up and returns every request
    /// received, in order.
    pub async fn finish(self) -> Vec<Received> {
        self.handle.await.unwrap()
    }
}

/// Starts a mock server and returns a client connected to it.
pub fn spawn<F>(handler: F) -> (Client, MockServer)
where
    F: FnMut(&Received) -> MockReply + Send + 'static,
{
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(serve(server_end, handler));
    let client = Client::from_stream(client_end, ConnectionConfig::default());
    (client, MockServer { handle })
}

async fn serve<F>(mut stream: DuplexStream, mut handler: F) -> Vec<Received>
where
    F: FnMut(&Received) -> MockReply,
{
    let mut log = Vec::new();
    loop {
        let mut header = [0u8; HEADER_SIZE];
        if stream.read_exact(&mut header).await.is_err() {
            break;
        }
        let header = MessageHeader::decode(&mut &header[..]).unwrap();
        let mut payload = vec![0u8; header.payload_len()];
        stream.read_exact(&mut payload).await.unwrap();

        let received = Received {
            request_id: header.request_id,
            op_code: OpCode::from_i32(header.op_code).unwrap(),
            payload: Bytes::from(payload),
        };
        let reply = handler(&received);
        if received.op_code.expects_reply() {
            let bytes = reply.encode(received.request_id);
            if stream.write_all(&bytes).await.is_err() {
                break;
            }
        }
        log.push(received);
    }
    log
}

/// A handler that stores documents per namespace and answers equality
/// queries, projections and a few commands.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryStore {
    pub fn handle(&mut self, req: &Received) -> MockReply {
        match req.op_code {
            OpCode::Insert => {
                let (ns, doc) = req.insert();
                self.collections.entry(ns).or_default().push(doc);
            }
            OpCode::Update => {
                let (ns, flags, selector, update) = req.update();
                self.update(ns, flags, &selector, update);
            }
            OpCode::Delete => {
                let (ns, flags, selector) = req.delete();
                let docs = self.collections.entry(ns).or_default();
                if flags & 1 != 0 {
                    if let Some(pos) = docs.iter().position(|d| matches(d, &selector)) {
                        docs.remove(pos);
                    }
                } else {
                    docs.retain(|d| !matches(d, &selector));
                }
            }
            OpCode::Query => {
                let (ns, _, _, query, fields) = req.query();
                if let Some(db) = ns.strip_suffix(".$cmd") {
                    return self.command(db, &query);
                }
                let predicate = match query.get_document("$query") {
                    Ok(inner) => inner.clone(),
                    Err(_) => query,
                };
                let docs = self
                    .find(&ns, &predicate)
                    .into_iter()
                    .map(|d| project(d, fields.as_ref()))
                    .collect();
                return MockReply::documents(docs);
            }
            _ => {}
        }
        MockReply::documents(vec![])
    }

    fn find(&self, ns: &str, predicate: &Document) -> Vec<Document> {
        self.collections
            .get(ns)
            .map(|docs| docs.iter().filter(|d| matches(d, predicate)).cloned().collect())
            .unwrap_or_default()
    }

    fn update(&mut self, ns: String, flags: i32, selector: &Document, update: Document) {
        let upsert = flags & 1 != 0;
        let multi = flags & 2 != 0;
        let docs = self.collections.entry(ns).or_default();
        let mut touched = false;
        for doc in docs.iter_mut().filter(|d| matches(d, selector)) {
            apply_update(doc, &update);
            touched = true;
            if !multi {
                break;
            }
        }
        if !touched && upsert {
            let mut doc = selector.clone();
            apply_update(&mut doc, &update);
            docs.push(doc);
        }
    }

    fn command(&mut self, db: &str, cmd: &Document) -> MockReply {
        let reply = match cmd.keys().next().map(String::as_str) {
            Some("count") => {
                let ns = format!("{}.{}", db, cmd.get_str("count").unwrap());
                let predicate = cmd.get_document("query").cloned().unwrap_or_default();
                let n = self.find(&ns, &predicate).len() as f64;
                bson::doc! { "n": n, "ok": 1.0 }
            }
            Some("drop") => {
                let ns = format!("{}.{}", db, cmd.get_str("drop").unwrap());
                match self.collections.remove(&ns) {
                    Some(_) => bson::doc! { "ok": 1.0 },
                    None => bson::doc! { "$err": "ns not found", "ok": 0.0 },
                }
            }
            _ => bson::doc! { "$err": "no such cmd", "ok": 0.0 },
        };
        MockReply::documents(vec![reply])
    }
}

/// Field equality on every key of `predicate`.
fn matches(doc: &Document, predicate: &Document) -> bool {
    predicate.iter().all(|(k, v)| doc.get(k) == Some(v))
}

fn apply_update(doc: &mut Document, update: &Document) {
    match update.get_document("$set") {
        Ok(set) => {
            for (k, v) in set {
                doc.insert(k.clone(), v.clone());
            }
        }
        Err(_) => *doc = update.clone(),
    }
}

/// Inclusive projections keep only the named keys; exclusive ones drop them.
fn project(doc: Document, fields: Option<&Document>) -> Document {
    let Some(fields) = fields else {
        return doc;
    };
    let inclusive = fields
        .iter()
        .any(|(_, v)| !matches!(v, Bson::Boolean(false) | Bson::Int32(0)));
    doc.into_iter()
        .filter(|(k, _)| fields.contains_key(k) == inclusive)
        .collect()
}
