//! Request payload encoding.
//!
//! Each request kind writes its opcode-specific payload after the header.
//! Documents arrive already BSON-encoded so a codec failure aborts the call
//! before any bytes are produced.
//!
//! ```text
//! INSERT       int32 0 | cstring ns | document
//! UPDATE       int32 0 | cstring ns | int32 flags | selector | update
//! DELETE       int32 0 | cstring ns | int32 flags | selector
//! QUERY        int32 flags | cstring ns | int32 skip | int32 return | query [| fields]
//! GET_MORE     int32 0 | cstring ns | int32 return | int64 cursor_id
//! KILL_CURSORS int32 0 | int32 count | int64 cursor_id...
//! ```

use crate::error::ProtocolError;
use crate::flags::{DeleteFlags, UpdateFlags};
use crate::header::{MessageHeader, HEADER_SIZE};
use crate::namespace::Namespace;
use crate::opcode::OpCode;
use bytes::{BufMut, BytesMut};

/// A client request with pre-encoded documents.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    Insert {
        namespace: &'a Namespace,
        document: &'a [u8],
    },
    Update {
        namespace: &'a Namespace,
        flags: UpdateFlags,
        selector: &'a [u8],
        update: &'a [u8],
    },
    Delete {
        namespace: &'a Namespace,
        flags: DeleteFlags,
        selector: &'a [u8],
    },
    Query {
        namespace: &'a Namespace,
        number_to_skip: i32,
        number_to_return: i32,
        query: &'a [u8],
        field_selector: Option<&'a [u8]>,
    },
    GetMore {
        namespace: &'a Namespace,
        number_to_return: i32,
        cursor_id: i64,
    },
    KillCursors {
        cursor_ids: &'a [i64],
    },
}

impl Request<'_> {
    pub fn op_code(&self) -> OpCode {
        match self {
            Request::Insert { .. } => OpCode::Insert,
            Request::Update { .. } => OpCode::Update,
            Request::Delete { .. } => OpCode::Delete,
            Request::Query { .. } => OpCode::Query,
            Request::GetMore { .. } => OpCode::GetMore,
            Request::KillCursors { .. } => OpCode::KillCursors,
        }
    }

    /// Size in bytes of the payload written by [`Request::encode_payload`].
    pub fn payload_len(&self) -> usize {
        match self {
            Request::Insert {
                namespace,
                document,
            } => 4 + namespace.wire_len() + document.len(),
            Request::Update {
                namespace,
                selector,
                update,
                ..
            } => 4 + namespace.wire_len() + 4 + selector.len() + update.len(),
            Request::Delete {
                namespace,
                selector,
                ..
            } => 4 + namespace.wire_len() + 4 + selector.len(),
            Request::Query {
                namespace,
                query,
                field_selector,
                ..
            } => {
                4 + namespace.wire_len()
                    + 8
                    + query.len()
                    + field_selector.map_or(0, |fields| fields.len())
            }
            Request::GetMore { namespace, .. } => 4 + namespace.wire_len() + 4 + 8,
            Request::KillCursors { cursor_ids } => 4 + 4 + 8 * cursor_ids.len(),
        }
    }

    /// Appends the opcode-specific payload to `buf`.
    pub fn encode_payload(&self, buf: &mut impl BufMut) {
        match *self {
            Request::Insert {
                namespace,
                document,
            } => {
                buf.put_i32_le(0);
                namespace.put(buf);
                buf.put_slice(document);
            }
            Request::Update {
                namespace,
                flags,
                selector,
                update,
            } => {
                buf.put_i32_le(0);
                namespace.put(buf);
                buf.put_i32_le(flags.bits());
                buf.put_slice(selector);
                buf.put_slice(update);
            }
            Request::Delete {
                namespace,
                flags,
                selector,
            } => {
                buf.put_i32_le(0);
                namespace.put(buf);
                buf.put_i32_le(flags.bits());
                buf.put_slice(selector);
            }
            Request::Query {
                namespace,
                number_to_skip,
                number_to_return,
                query,
                field_selector,
            } => {
                // Query flags are reserved.
                buf.put_i32_le(0);
                namespace.put(buf);
                buf.put_i32_le(number_to_skip);
                buf.put_i32_le(number_to_return);
                buf.put_slice(query);
                if let Some(fields) = field_selector {
                    buf.put_slice(fields);
                }
            }
            Request::GetMore {
                namespace,
                number_to_return,
                cursor_id,
            } => {
                buf.put_i32_le(0);
                namespace.put(buf);
                buf.put_i32_le(number_to_return);
                buf.put_i64_le(cursor_id);
            }
            Request::KillCursors { cursor_ids } => {
                buf.put_i32_le(0);
                buf.put_i32_le(cursor_ids.len() as i32);
                for id in cursor_ids {
                    buf.put_i64_le(*id);
                }
            }
        }
    }
}

/// Encodes a complete message: header followed by the request payload.
pub fn encode_message(
    request_id: i32,
    response_to: i32,
    request: &Request<'_>,
) -> Result<BytesMut, ProtocolError> {
    let payload_len = request.payload_len();
    let header = MessageHeader::for_payload(
        request_id,
        response_to,
        request.op_code().as_i32(),
        payload_len,
    )?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload_len);
    header.encode(&mut buf);
    request.encode_payload(&mut buf);
    debug_assert_eq!(buf.len(), header.message_length as usize);

    Ok(buf)
}
