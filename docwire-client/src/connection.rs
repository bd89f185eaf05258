//! Connection management and message framing.
//!
//! A connection owns one byte stream. Requests are strictly sequential: a
//! request that expects a reply holds the stream lock from the first byte
//! written until its reply has been read, so replies arrive in request
//! order and never interleave.

use crate::error::ClientError;
use crate::stream::{BoxedTransport, Transport};
use bytes::Bytes;
use docwire_protocol::header::remaining_after_length;
use docwire_protocol::{encode_message, Reply, Request, DEFAULT_PORT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address as `host:port`.
    pub addr: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline for a reply to arrive. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on TCP connections.
    pub nodelay: bool,
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            nodelay: true,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{}", DEFAULT_PORT))
    }
}

/// Generates a request id: a random positive 31-bit value.
fn next_request_id() -> i32 {
    (rand::random::<u32>() >> 1) as i32
}

/// A connection to a document database server.
pub struct Connection {
    config: ConnectionConfig,
    /// The byte stream; `None` once closed.
    stream: Mutex<Option<BoxedTransport>>,
    /// Set after a transport or protocol failure left the stream in an
    /// unknown state.
    broken: AtomicBool,
}

impl Connection {
    /// Dials the server over TCP.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let tcp_stream =
            tokio::time::timeout(config.connect_timeout, TcpStream::connect(&config.addr))
                .await
                .map_err(|_| {
                    tracing::debug!("Connection timeout");
                    ClientError::Timeout
                })?
                .map_err(|e| {
                    tracing::debug!("Connection failed: {}", e);
                    ClientError::Io(e)
                })?;

        if config.nodelay {
            tcp_stream.set_nodelay(true).ok();
        }

        tracing::debug!("TCP connected to {}", config.addr);
        Ok(Self::from_stream(tcp_stream, config))
    }

    /// Wraps an already-established byte stream.
    pub fn from_stream(stream: impl Transport + 'static, config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(Some(Box::new(stream))),
            broken: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns whether an earlier failure made this connection unusable.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Sends a request that has no reply (insert, update, delete,
    /// kill-cursors). Returns the request id used.
    pub async fn send(&self, request: &Request<'_>) -> Result<i32, ClientError> {
        let message = self.encode(request)?;

        let mut guard = self.stream.lock().await;
        let stream = self.usable_stream(&mut guard)?;
        let in_flight = InFlight::new(&self.broken);
        let result = write_message(stream, &message).await;
        self.poison_on_error(result)?;
        in_flight.complete();

        Ok(message.request_id)
    }

    /// Sends a request and waits for its reply.
    pub async fn round_trip(&self, request: &Request<'_>) -> Result<Reply, ClientError> {
        let message = self.encode(request)?;

        let mut guard = self.stream.lock().await;
        let stream = self.usable_stream(&mut guard)?;
        let in_flight = InFlight::new(&self.broken);

        let result = write_message(stream, &message).await;
        self.poison_on_error(result)?;

        let result = match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read_reply(stream))
                .await
                .unwrap_or_else(|_| {
                    tracing::debug!("Request id={} timed out", message.request_id);
                    Err(ClientError::Timeout)
                }),
            None => read_reply(stream).await,
        };
        let reply = self.poison_on_error(result)?;

        if reply.response_to != message.request_id {
            tracing::warn!(
                "Reply answers request id={} but id={} was sent",
                reply.response_to,
                message.request_id
            );
            return self.poison_on_error(Err(ClientError::ResponseMismatch {
                expected: message.request_id,
                actual: reply.response_to,
            }));
        }
        in_flight.complete();
        tracing::debug!(
            "Request id={} got reply: cursor_id={} returned={} flags={:#x}",
            message.request_id,
            reply.cursor_id,
            reply.number_returned,
            reply.flags.bits()
        );

        Ok(reply)
    }

    /// Shuts down the stream. Later requests fail with
    /// [`ClientError::ConnectionClosed`].
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection to {}", self.config.addr);
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }

    fn encode(&self, request: &Request<'_>) -> Result<OutgoingMessage, ClientError> {
        let request_id = next_request_id();
        let bytes = encode_message(request_id, 0, request)?.freeze();
        tracing::debug!(
            "Sending {} id={} ({} bytes)",
            request.op_code(),
            request_id,
            bytes.len()
        );
        Ok(OutgoingMessage { request_id, bytes })
    }

    fn usable_stream<'a>(
        &self,
        guard: &'a mut Option<BoxedTransport>,
    ) -> Result<&'a mut BoxedTransport, ClientError> {
        if self.is_broken() {
            return Err(ClientError::ConnectionBroken);
        }
        guard.as_mut().ok_or(ClientError::ConnectionClosed)
    }

    fn poison_on_error<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ref e) = result {
            tracing::debug!("Connection to {} marked broken: {}", self.config.addr, e);
            self.broken.store(true, Ordering::SeqCst);
        }
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.config.addr)
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

/// Marks the connection broken unless the exchange it guards completes.
/// A future dropped between the first byte written and the last byte read
/// leaves the stream mid-message.
struct InFlight<'a> {
    broken: &'a AtomicBool,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(broken: &'a AtomicBool) -> Self {
        Self {
            broken,
            done: false,
        }
    }

    fn complete(mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.broken.store(true, Ordering::SeqCst);
        }
    }
}

struct OutgoingMessage {
    request_id: i32,
    bytes: Bytes,
}

/// Writes header and payload as one buffer.
async fn write_message(
    stream: &mut BoxedTransport,
    message: &OutgoingMessage,
) -> Result<(), ClientError> {
    stream.write_all(&message.bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one length-prefixed message and decodes it as a reply.
async fn read_reply(stream: &mut BoxedTransport) -> Result<Reply, ClientError> {
    let mut length = [0u8; 4];
    read_exact(stream, &mut length).await?;
    let remaining = remaining_after_length(i32::from_le_bytes(length))?;

    let mut body = vec![0u8; remaining];
    read_exact(stream, &mut body).await?;
    tracing::debug!("Read reply ({} bytes)", remaining + 4);

    Ok(Reply::decode(Bytes::from(body))?)
}

async fn read_exact(stream: &mut BoxedTransport, buf: &mut [u8]) -> Result<(), ClientError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            tracing::debug!("Connection closed mid-message");
            Err(ClientError::ConnectionClosed)
        }
        Err(e) => Err(ClientError::Io(e)),
    }
}
