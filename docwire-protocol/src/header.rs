//! Standard message header.
//!
//! Every message, request or reply, starts with four little-endian int32s:
//!
//! ```text
//! +----------------+------------+-------------+---------+
//! | message_length | request_id | response_to | op_code |
//! |    4 bytes     |  4 bytes   |   4 bytes   | 4 bytes |
//! +----------------+------------+-------------+---------+
//! ```
//!
//! `message_length` counts the header itself. `response_to` is 0 for
//! client-initiated requests.

use crate::error::ProtocolError;
use crate::MAX_MESSAGE_SIZE;
use bytes::{Buf, BufMut};

/// Size of the message header in bytes (4 * int32).
pub const HEADER_SIZE: usize = 16;

/// A decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message length, header included.
    pub message_length: i32,
    /// Identifier chosen by the sender.
    pub request_id: i32,
    /// Request id this message answers (0 for requests).
    pub response_to: i32,
    /// Raw operation code.
    pub op_code: i32,
}

impl MessageHeader {
    /// Creates a request header for a payload of `payload_len` bytes.
    pub fn for_payload(
        request_id: i32,
        response_to: i32,
        op_code: i32,
        payload_len: usize,
    ) -> Result<Self, ProtocolError> {
        let total = HEADER_SIZE + payload_len;
        if total > MAX_MESSAGE_SIZE as usize {
            return Err(ProtocolError::MessageTooLarge {
                size: total,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(Self {
            message_length: total as i32,
            request_id,
            response_to,
            op_code,
        })
    }

    /// Appends the header to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.message_length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.op_code);
    }

    /// Decodes a header from the front of `buf`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            message_length: buf.get_i32_le(),
            request_id: buf.get_i32_le(),
            response_to: buf.get_i32_le(),
            op_code: buf.get_i32_le(),
        })
    }

    /// Number of bytes that follow the header.
    pub fn payload_len(&self) -> usize {
        (self.message_length as usize).saturating_sub(HEADER_SIZE)
    }
}

/// Validates the total length read from the first four bytes of a message
/// and returns how many more bytes belong to it.
pub fn remaining_after_length(message_length: i32) -> Result<usize, ProtocolError> {
    if message_length < HEADER_SIZE as i32 {
        return Err(ProtocolError::InvalidMessageLength(message_length));
    }
    if message_length as u32 > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: message_length as usize,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(message_length as usize - 4)
}
