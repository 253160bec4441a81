//! Connection Handler
//!
//! Serves one client: read a command, execute it, write the response,
//! until the client goes away.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Engine, Reply};
use crate::error::{Result, ShelfError};
use crate::protocol::{
    encode_collections, encode_entries, read_command, write_response, Command, Response,
};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared request handler
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O; call [`Connection::set_timeouts`] before
    /// [`Connection::handle`] to bound idle clients.
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            engine,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 disables)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// A malformed frame gets a BAD_REQUEST response and closes the
    /// connection, since the stream position is no longer trustworthy.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "Connection established");

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(ShelfError::Io(ref e)) if is_hangup(e.kind()) => {
                    tracing::debug!(peer = %self.peer_addr, kind = ?e.kind(), "Client disconnected");
                    return Ok(());
                }
                Err(ShelfError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!(peer = %self.peer_addr, "Read timeout");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "Bad request");
                    let _ = self.send_response(Response::from_error(&e));
                    return Err(e);
                }
            };

            tracing::trace!(peer = %self.peer_addr, ?command, "Received command");

            let response = self.execute_command(command);

            if let Err(e) = self.send_response(response) {
                if let ShelfError::Io(ref io_err) = e {
                    if is_hangup(io_err.kind()) {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            "Client disconnected before response could be sent"
                        );
                        return Ok(());
                    }
                }
                tracing::warn!(peer = %self.peer_addr, error = %e, "Error writing response");
                return Err(e);
            }
        }
    }

    /// Execute a command and return a response
    fn execute_command(&self, command: Command) -> Response {
        match self.engine.execute(command) {
            Ok(reply) => Self::reply_to_response(reply),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::debug!(peer = %self.peer_addr, error = %e, "Command failed");
                }
                Response::from_error(&e)
            }
        }
    }

    fn reply_to_response(reply: Reply) -> Response {
        match reply {
            Reply::Done => Response::ok(None),
            Reply::Deleted { existed } => {
                let text: &[u8] = if existed { b"deleted" } else { b"absent" };
                Response::ok(Some(text.to_vec()))
            }
            Reply::Degraded(warning) => Response::degraded(&warning.to_string()),
            Reply::Value(value) => Response::ok(Some(value.into_bytes())),
            Reply::Entries(entries) => Response::ok(Some(encode_entries(&entries))),
            Reply::Collections(collections) => {
                Response::ok(Some(encode_collections(&collections)))
            }
            Reply::Pong => Response::ok(Some(b"PONG".to_vec())),
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: Response) -> Result<()> {
        write_response(&mut self.writer, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_hangup(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
