//! TCP Server
//!
//! The acceptor: binds the listening socket, spawns one connection task per
//! client, and coordinates shutdown with the [`Shutdown`] state.
//!
//! ## Shutdown Sequence
//!
//! ```text
//! signal ──> trigger() ──> accept loop exits ──> listener dropped
//!                                                     │
//!                                                     ▼
//!                                 drain: wait for outstanding == 0
//!                                        (optionally bounded)
//! ```
//!
//! Once the listener is dropped new connection attempts are refused.
//! Connections accepted before that run to completion; the server waits for
//! them before returning.

pub mod shutdown;

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info, warn};

pub use shutdown::{termination_signal, ConnectionGuard, Shutdown};

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The bound address could not be read back
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Summary returned when the server has shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections still open when the drain gave up (zero when drained)
    pub abandoned: usize,
    /// Total connections accepted during the run
    pub connections_accepted: u64,
    /// Total commands processed during the run
    pub commands_processed: u64,
}

/// The line-protocol server.
pub struct Server {
    listener: TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: Arc<Shutdown>,
    drain_timeout: Option<Duration>,
}

impl Server {
    /// Binds a listener on `addr` and creates a server around it.
    pub async fn bind<A>(addr: A, handler: CommandHandler) -> Result<Self, ServerError>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::from_listener(listener, handler))
    }

    /// Creates a server from an already bound listener.
    pub fn from_listener(listener: TcpListener, handler: CommandHandler) -> Self {
        Self {
            listener,
            handler,
            stats: Arc::new(ConnectionStats::new()),
            shutdown: Shutdown::new(),
            drain_timeout: None,
        }
    }

    /// Bounds how long shutdown waits for open connections.
    ///
    /// `None` (the default) waits for every connection to finish.
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Returns the shared shutdown state.
    ///
    /// Calling [`Shutdown::trigger`] on it stops the server just like a
    /// termination signal does.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Returns the shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Serves until SIGINT or SIGTERM, then drains.
    pub async fn run(self) -> ShutdownReport {
        self.run_until(async {
            let name = termination_signal().await;
            info!(signal = name, "Received {}, stopping", name);
        })
        .await
    }

    /// Serves until `signal` completes or the shutdown handle is triggered,
    /// then drains.
    pub async fn run_until<F>(self, signal: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            handler,
            stats,
            shutdown,
            drain_timeout,
        } = self;
        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                _ = &mut signal => {
                    shutdown.trigger();
                    break;
                }
                _ = shutdown.stopped() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if !shutdown.is_serving() {
                            debug!(client = %addr, "Dropping connection accepted during shutdown");
                            break;
                        }
                        let guard = shutdown.register();
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            handler.clone(),
                            Arc::clone(&stats),
                            guard,
                        ));
                    }
                    Err(e) => {
                        if !shutdown.is_serving() {
                            break;
                        }
                        error!(error = %e, "Failed to accept connection");
                    }
                },
            }
        }

        // Stop listening before draining so new clients are refused
        drop(listener);

        let outstanding = shutdown.outstanding();
        if outstanding > 0 {
            info!(outstanding, "Stopped accepting connections, waiting for clients");
        }

        let abandoned = shutdown.drain(drain_timeout).await;
        if abandoned > 0 {
            warn!(abandoned, "Drain timed out, abandoning open connections");
        } else {
            info!("All connections drained");
        }

        ShutdownReport {
            abandoned,
            connections_accepted: stats.connections_accepted.load(Ordering::Relaxed),
            commands_processed: stats.commands_processed.load(Ordering::Relaxed),
        }
    }
}

/// Turns the `:port` shorthand into an all-interfaces address.
///
/// ```
/// use linekv::server::normalize_address;
///
/// assert_eq!(normalize_address(":36379"), "0.0.0.0:36379");
/// assert_eq!(normalize_address("127.0.0.1:8080"), "127.0.0.1:8080");
/// ```
pub fn normalize_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
