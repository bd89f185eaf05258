//! Byte stream abstraction.
//!
//! The driver only needs a duplex byte channel with `write_all` and
//! `read_exact`. TCP is the usual transport; tests plug in in-memory pipes.

use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex byte stream a [`Connection`](crate::Connection) can own.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased transport owned by a connection.
pub type BoxedTransport = Box<dyn Transport>;
