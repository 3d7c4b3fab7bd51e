//! Connection Handler Module
//!
//! This module handles individual client connections to linekv.
//! Each client gets its own handler task that runs in a loop,
//! reading lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, acceptor registers it as outstanding
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read one line           │ │  AWAITING_LINE
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Tokenize + execute      │ │  DISPATCHING
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write reply, flush      │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │    [Loop back unless QUIT]   │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / QUIT / I/O error
//!        │
//!        ▼
//! 5. Stream dropped, guard released
//! ```
//!
//! Commands on one connection are handled strictly one after another.

use crate::commands::CommandHandler;
use crate::protocol::{parse_line, Reply};
use crate::server::shutdown::ConnectionGuard;
use bytes::BytesMut;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    ReadHalf, WriteHalf,
};
use tracing::{debug, info, trace, warn};

/// Maximum length of a request line, terminator included (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Initial line buffer capacity
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// How a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client closed its end of the stream
    ClientClosed,
    /// The client sent QUIT
    Quit,
}

/// Handles a single client connection.
///
/// Generic over the stream so tests can drive it with in-memory pipes.
pub struct ConnectionHandler<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,

    /// Peer description (for logging)
    peer: String,

    /// Buffer for the current line
    line: Vec<u8>,

    /// Buffer for the current reply
    out: BytesMut,

    /// The command handler (shared store)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Keeps the connection counted until the handler is dropped
    _guard: Option<ConnectionGuard>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `peer` - Description of the client (for logging)
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        peer: impl fmt::Display,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            peer: peer.to_string(),
            line: Vec::with_capacity(INITIAL_BUFFER_SIZE),
            out: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            _guard: None,
        }
    }

    /// Ties the outstanding-connection guard to this handler's lifetime.
    pub fn with_guard(mut self, guard: ConnectionGuard) -> Self {
        self._guard = Some(guard);
        self
    }

    /// Runs the main connection loop.
    ///
    /// Consumes the handler; the stream is closed and the guard released
    /// when this returns, on every path.
    pub async fn run(mut self) -> Result<Disconnect, ConnectionError> {
        info!(client = %self.peer, "Start to handle requests");

        let result = self.main_loop().await;

        match &result {
            Ok(Disconnect::Quit) => info!(client = %self.peer, "Client quit"),
            Ok(Disconnect::ClientClosed) => info!(client = %self.peer, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.peer, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.peer, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<Disconnect, ConnectionError> {
        loop {
            if !self.read_line().await? {
                return Ok(Disconnect::ClientClosed);
            }

            let op = {
                let text = String::from_utf8_lossy(&self.line);
                parse_line(&text)
            };
            trace!(client = %self.peer, operator = %op.operator, "Parsed request");

            let reply = self.command_handler.execute(op);
            self.stats.command_processed();

            self.send_reply(&reply).await?;

            if reply.closes_connection() {
                return Ok(Disconnect::Quit);
            }
        }
    }

    /// Reads the next line into `self.line`, without its terminator.
    ///
    /// Returns `false` once the client has closed the stream and no partial
    /// line is left over. A final line without a terminator is still
    /// returned.
    async fn read_line(&mut self) -> Result<bool, ConnectionError> {
        self.line.clear();

        let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH as u64);
        let n = limited.read_until(b'\n', &mut self.line).await?;

        if n == 0 {
            return Ok(false);
        }
        self.stats.bytes_read(n);

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        } else if n == MAX_LINE_LENGTH {
            return Err(ConnectionError::LineTooLong);
        }

        Ok(true)
    }

    /// Sends a reply to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        self.out.clear();
        reply.serialize_into(&mut self.out);

        if !self.out.is_empty() {
            self.writer.write_all(&self.out).await?;
            self.writer.flush().await?;
            self.stats.bytes_written(self.out.len());
            trace!(client = %self.peer, bytes = self.out.len(), "Sent reply");
        }
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request line exceeded the length limit
    #[error("request line longer than {} bytes", MAX_LINE_LENGTH)]
    LineTooLong,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors have already been logged by the
/// handler.
pub async fn handle_connection<S>(
    stream: S,
    peer: impl fmt::Display,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    guard: ConnectionGuard,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, peer, command_handler, stats).with_guard(guard);
    let _ = handler.run().await;
}
