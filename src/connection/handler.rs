//! Connection Handler Module
//!
//! Handles one client connection: each client gets its own task that runs
//! in a loop, reading commands and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode buffered frames  │◄┼──── read more bytes
//!    │  └───────────┬─────────────┘ │     (or stop on cancel)
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send reply              │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / I/O error / server shutdown
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a byte stream: one read may hold half a command or several. Reads
//! accumulate in a `BytesMut`, and complete frames are cut off the front one
//! at a time, so pipelined commands are answered in order.
//!
//! A malformed frame gets a `-ERR <cause>` reply. Its bytes are skipped up
//! to the next line that can start a frame, and decoding carries on with
//! whatever is still buffered. The connection stays open.
//!
//! The buffer may hold two maximum-size bulk strings plus framing, so any
//! argument the parser accepts fits. Past that the client is disconnected.

use crate::commands::CommandHandler;
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::protocol::{resync_len, Command, CommandParser, ParseError, RespValue};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Framing allowance on top of the bulk payloads (64 KB)
const FRAME_OVERHEAD: usize = 64 * 1024;

/// Maximum amount of undecoded input held for one client
pub const MAX_BUFFER_SIZE: usize = buffer_limit(MAX_BULK_SIZE);

/// Undecoded input allowed when bulk strings are capped at `max_bulk_size`.
pub const fn buffer_limit(max_bulk_size: usize) -> usize {
    max_bulk_size.saturating_mul(2).saturating_add(FRAME_OVERHEAD)
}

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Frames that failed to decode
    pub protocol_errors: AtomicU64,
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

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop runs on a `TcpStream` or an
/// in-memory stream.
pub struct ConnectionHandler<S> {
    /// The client stream; replies go through the write buffer
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes read but not yet decoded
    buffer: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    parser: CommandParser,

    /// Undecoded input that triggers `BufferFull`
    max_buffer_size: usize,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Server shutdown
    cancel: CancellationToken,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        cancel: CancellationToken,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: CommandParser::new(),
            max_buffer_size: MAX_BUFFER_SIZE,
            stats,
            cancel,
        }
    }

    /// Caps bulk strings at `max_bulk_size` bytes and sizes the read buffer
    /// to match.
    pub fn with_max_bulk_size(mut self, max_bulk_size: usize) -> Self {
        self.parser = CommandParser::with_max_bulk_size(max_bulk_size);
        self.max_buffer_size = buffer_limit(max_bulk_size);
        self
    }

    /// Runs the connection loop until the client disconnects, an I/O error
    /// occurs, or the server shuts down.
    ///
    /// Server shutdown ends the loop with `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed by server"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let cancel = self.cancel.clone();

        loop {
            loop {
                match self.try_parse_command() {
                    Ok(Some(command)) => {
                        let response = self.command_handler.execute(command);
                        self.stats.command_processed();
                        self.send_response(&response).await?;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let skipped = resync_len(&self.buffer);
                        warn!(client = %self.addr, error = %e, skipped, "Protocol error");
                        self.stats.protocol_error();
                        let _ = self.buffer.split_to(skipped);
                        self.send_response(&RespValue::error(format!("ERR {}", e)))
                            .await?;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                read = self.read_more_data() => read?,
            }
        }
    }

    /// Attempts to decode one command from the front of the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Command>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((command, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed command"
                );
                Ok(Some(command))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Reads more data from the stream into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= self.max_buffer_size {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            // Partial command in buffer
            return Err(ConnectionError::UnexpectedEof);
        }

        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(())
    }

    /// Sends a reply to the client.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client disconnected between commands
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client disconnected in the middle of a command
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Too much undecoded input
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper around [`ConnectionHandler::run`] for spawning: the
/// outcome has already been logged by `run`.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, cancel);
    let _ = handler.run().await;
}
