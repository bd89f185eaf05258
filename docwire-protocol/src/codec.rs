//! BSON document codec.
//!
//! Documents are opaque to the protocol layer: it only needs bytes to send
//! and a way to turn reply slices back into values.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value into its canonical BSON bytes.
pub fn encode_document<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(bson::to_vec(value)?)
}

/// Decodes one BSON document into `T`.
///
/// `index` and `offset` locate the document inside the message being decoded
/// and are only used for error reporting.
pub fn decode_document<T: DeserializeOwned>(
    bytes: &[u8],
    index: usize,
    offset: usize,
) -> Result<T, ProtocolError> {
    bson::from_slice(bytes).map_err(|source| ProtocolError::Document {
        index,
        offset,
        source,
    })
}

/// Reads the little-endian length prefix of the document starting at
/// `offset`, without validating it.
pub fn peek_document_length(buf: &[u8], offset: usize) -> Option<i32> {
    let prefix = buf.get(offset..offset + 4)?;
    Some(i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]))
}
