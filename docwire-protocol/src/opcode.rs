//! Operation codes carried in the message header.

use crate::error::ProtocolError;
use std::fmt;

/// Operation kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    /// Reply to a client request.
    Reply = 1,
    Update = 2001,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Delete = 2006,
    KillCursors = 2007,
}

impl OpCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Result<Self, ProtocolError> {
        match code {
            1 => Ok(OpCode::Reply),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            other => Err(ProtocolError::UnknownOpCode(other)),
        }
    }

    /// Returns whether the server answers this operation with a reply.
    pub fn expects_reply(self) -> bool {
        matches!(self, OpCode::Query | OpCode::GetMore)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Reply => write!(f, "OP_REPLY"),
            OpCode::Update => write!(f, "OP_UPDATE"),
            OpCode::Insert => write!(f, "OP_INSERT"),
            OpCode::Query => write!(f, "OP_QUERY"),
            OpCode::GetMore => write!(f, "OP_GET_MORE"),
            OpCode::Delete => write!(f, "OP_DELETE"),
            OpCode::KillCursors => write!(f, "OP_KILL_CURSORS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(OpCode::Reply.as_i32(), 1);
        assert_eq!(OpCode::Update.as_i32(), 2001);
        assert_eq!(OpCode::Insert.as_i32(), 2002);
        assert_eq!(OpCode::Query.as_i32(), 2004);
        assert_eq!(OpCode::GetMore.as_i32(), 2005);
        assert_eq!(OpCode::Delete.as_i32(), 2006);
        assert_eq!(OpCode::KillCursors.as_i32(), 2007);
    }

    #[test]
    fn test_from_i32() {
        assert_eq!(OpCode::from_i32(2004).unwrap(), OpCode::Query);
        assert!(matches!(
            OpCode::from_i32(2003),
            Err(ProtocolError::UnknownOpCode(2003))
        ));
    }

    #[test]
    fn test_expects_reply() {
        assert!(OpCode::Query.expects_reply());
        assert!(OpCode::GetMore.expects_reply());
        assert!(!OpCode::Insert.expects_reply());
        assert!(!OpCode::KillCursors.expects_reply());
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::KillCursors.to_string(), "OP_KILL_CURSORS");
        assert_eq!(OpCode::Reply.to_string(), "OP_REPLY");
    }
}
