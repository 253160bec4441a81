//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.
//!
//! ```text
//!   acceptor (non-blocking, polls shutdown flag)
//!       │  try_send
//!       ▼
//!   bounded queue (max_connections) ──► worker 0..N ──► Connection::handle
//!       │ full
//!       ▼
//!   ERROR response, stream closed
//! ```

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TrySendError};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, ShelfError};
use crate::protocol::{write_response, Response};

use super::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for ShelfDB
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// Binding to port 0 picks a free port; see [`Server::local_addr`].
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            ShelfError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        tracing::info!(addr = %listener.local_addr()?, "Server listening");

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops [`Server::run`] when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Start the server (blocking)
    ///
    /// Returns once the shutdown flag is set and every worker has finished
    /// its current connection.
    pub fn run(&self) -> Result<()> {
        let (sender, receiver) = channel::bounded::<TcpStream>(self.config.max_connections);

        let workers = (0..self.config.worker_threads)
            .map(|id| self.spawn_worker(id, receiver.clone()))
            .collect::<Result<Vec<_>>>()?;
        drop(receiver);

        tracing::info!(workers = workers.len(), "Accepting connections");

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!(%peer, error = %e, "Failed to configure stream");
                        continue;
                    }
                    match sender.try_send(stream) {
                        Ok(()) => tracing::trace!(%peer, "Queued connection"),
                        Err(TrySendError::Full(stream)) => reject(stream, peer),
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(ShelfError::Network("worker pool is gone".to_string()));
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                }
            }
        }

        tracing::info!("Shutdown requested, draining workers");
        drop(sender);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        Ok(())
    }

    fn spawn_worker(&self, id: usize, receiver: Receiver<TcpStream>) -> Result<JoinHandle<()>> {
        let engine = Arc::clone(&self.engine);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        thread::Builder::new()
            .name(format!("shelfdb-worker-{}", id))
            .spawn(move || {
                for stream in receiver.iter() {
                    let result = Connection::new(stream, Arc::clone(&engine)).and_then(|mut conn| {
                        conn.set_timeouts(read_ms, write_ms)?;
                        conn.handle()
                    });
                    if let Err(e) = result {
                        tracing::debug!(worker = id, error = %e, "Connection ended with error");
                    }
                }
            })
            .map_err(ShelfError::from)
    }
}

/// Turn away a connection the pool has no room for
fn reject(mut stream: TcpStream, peer: SocketAddr) {
    tracing::warn!(%peer, "Connection queue full, rejecting client");
    let _ = write_response(&mut stream, &Response::error("server busy"));
}
