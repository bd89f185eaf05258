//! Reply decoding.
//!
//! Reply layout after the length prefix:
//!
//! ```text
//! int32 request_id | int32 response_to | int32 op_code (1)
//! int32 response_flags | int64 cursor_id | int32 starting_from | int32 number_returned
//! number_returned * (int32 document_length | document_length - 4 bytes)
//! ```
//!
//! Decoding happens in two steps. [`Reply::decode`] validates the fixed
//! fields and splits the document area by length prefixes. The caller then
//! picks the target type with [`Reply::into_batch`], which decodes documents
//! in order and stops at the first failure, keeping what was already decoded.

use crate::codec::{decode_document, peek_document_length};
use crate::error::ProtocolError;
use crate::flags::ResponseFlags;
use crate::header::{MessageHeader, HEADER_SIZE};
use crate::opcode::OpCode;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;

/// Size of the fixed reply fields that follow the header.
pub const REPLY_FIELDS_SIZE: usize = 4 + 8 + 4 + 4;

/// Smallest valid BSON document: length prefix plus terminator.
const MIN_DOCUMENT_SIZE: i32 = 5;

/// A raw document slice and its offset from the start of the message.
#[derive(Debug, Clone)]
struct RawDocument {
    offset: usize,
    bytes: Bytes,
}

/// A decoded reply whose documents are still raw BSON.
#[derive(Debug)]
pub struct Reply {
    pub request_id: i32,
    pub response_to: i32,
    pub flags: ResponseFlags,
    /// Server cursor id; 0 when no cursor remains open.
    pub cursor_id: i64,
    pub starting_from: i32,
    pub number_returned: i32,
    documents: Vec<RawDocument>,
    /// Set when the document area ended before `number_returned` documents.
    framing_error: Option<ProtocolError>,
}

/// Documents decoded from a reply.
///
/// When `error` is set, `documents` holds every document decoded before the
/// failure, in reply order.
#[derive(Debug)]
pub struct Batch<T> {
    pub documents: Vec<T>,
    pub error: Option<ProtocolError>,
}

impl<T> Batch<T> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Discards partial results: any error wins.
    pub fn into_result(self) -> Result<Vec<T>, ProtocolError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.documents),
        }
    }
}

/// Reads one little-endian i32 field, reporting its message offset on failure.
fn read_i32(buf: &mut Bytes, offset: usize) -> Result<i32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Truncated {
            offset,
            needed: 4,
            available: buf.remaining(),
        });
    }
    Ok(buf.get_i32_le())
}

fn read_i64(buf: &mut Bytes, offset: usize) -> Result<i64, ProtocolError> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::Truncated {
            offset,
            needed: 8,
            available: buf.remaining(),
        });
    }
    Ok(buf.get_i64_le())
}

impl Reply {
    /// Decodes a reply from `body`, the message bytes that follow the
    /// 4-byte length prefix.
    pub fn decode(body: Bytes) -> Result<Self, ProtocolError> {
        let mut buf = body.clone();

        let request_id = read_i32(&mut buf, 4)?;
        let response_to = read_i32(&mut buf, 8)?;
        let op_code = read_i32(&mut buf, 12)?;
        if op_code != OpCode::Reply.as_i32() {
            return Err(ProtocolError::UnexpectedOpCode {
                expected: OpCode::Reply.as_i32(),
                actual: op_code,
            });
        }

        let flags = ResponseFlags::from_bits(read_i32(&mut buf, 16)?);
        let cursor_id = read_i64(&mut buf, 20)?;
        let starting_from = read_i32(&mut buf, 28)?;
        let number_returned = read_i32(&mut buf, 32)?;
        if number_returned < 0 {
            return Err(ProtocolError::NegativeDocumentCount(number_returned));
        }

        let (documents, framing_error) = split_documents(&body, number_returned as usize);

        Ok(Self {
            request_id,
            response_to,
            flags,
            cursor_id,
            starting_from,
            number_returned,
            documents,
            framing_error,
        })
    }

    /// Number of document slices successfully framed.
    pub fn raw_len(&self) -> usize {
        self.documents.len()
    }

    /// Raw BSON bytes of the framed documents.
    pub fn raw_documents(&self) -> impl Iterator<Item = &[u8]> {
        self.documents.iter().map(|doc| doc.bytes.as_ref())
    }

    /// Decodes the documents into `T`, stopping at the first failure.
    pub fn into_batch<T: DeserializeOwned>(self) -> Batch<T> {
        let mut documents = Vec::with_capacity(self.documents.len());
        for (index, raw) in self.documents.iter().enumerate() {
            match decode_document(&raw.bytes, index, raw.offset) {
                Ok(doc) => documents.push(doc),
                Err(err) => {
                    return Batch {
                        documents,
                        error: Some(err),
                    }
                }
            }
        }
        Batch {
            documents,
            error: self.framing_error,
        }
    }
}

/// Splits the document area of a reply body into length-prefixed slices.
fn split_documents(body: &Bytes, count: usize) -> (Vec<RawDocument>, Option<ProtocolError>) {
    // Offsets inside `body` are 4 less than message offsets.
    let start = HEADER_SIZE - 4 + REPLY_FIELDS_SIZE;
    let mut documents = Vec::with_capacity(count.min(body.len() / MIN_DOCUMENT_SIZE as usize));
    let mut pos = start;

    for _ in 0..count {
        let Some(length) = peek_document_length(body, pos) else {
            let err = ProtocolError::Truncated {
                offset: pos + 4,
                needed: 4,
                available: body.len().saturating_sub(pos),
            };
            return (documents, Some(err));
        };
        if length < MIN_DOCUMENT_SIZE || pos + length as usize > body.len() {
            let err = ProtocolError::InvalidDocumentLength {
                offset: pos + 4,
                length,
            };
            return (documents, Some(err));
        }

        let end = pos + length as usize;
        documents.push(RawDocument {
            offset: pos + 4,
            bytes: body.slice(pos..end),
        });
        pos = end;
    }

    (documents, None)
}

/// Encodes a complete reply message.
///
/// Clients never send replies; this exists for in-memory test servers and
/// benchmarks that need to speak the server side of the protocol.
pub fn encode_reply(
    request_id: i32,
    response_to: i32,
    flags: ResponseFlags,
    cursor_id: i64,
    starting_from: i32,
    documents: &[Vec<u8>],
) -> Result<BytesMut, ProtocolError> {
    let docs_len: usize = documents.iter().map(Vec::len).sum();
    let header = MessageHeader::for_payload(
        request_id,
        response_to,
        OpCode::Reply.as_i32(),
        REPLY_FIELDS_SIZE + docs_len,
    )?;

    let mut buf = BytesMut::with_capacity(header.message_length as usize);
    header.encode(&mut buf);
    buf.put_i32_le(flags.bits());
    buf.put_i64_le(cursor_id);
    buf.put_i32_le(starting_from);
    buf.put_i32_le(documents.len() as i32);
    for doc in documents {
        buf.put_slice(doc);
    }
    Ok(buf)
}
