//! Shutdown Coordination
//!
//! Two pieces of state are shared between the accept loop and every
//! connection task:
//!
//! - the **serving** flag, which flips from `true` to `false` exactly once
//!   when shutdown is requested and never flips back;
//! - the **outstanding** count of connections, incremented when a connection
//!   is accepted and decremented when its handler exits.
//!
//! Both are atomics. A `Notify` next to each lets tasks wait for the flip or
//! for the count to reach zero without polling.
//!
//! ## Lifecycle
//!
//! ```text
//!   serving ──trigger()──> stopping ──outstanding == 0──> drained
//!      │                      │
//!      │ accept + register()  │ no new connections
//!      ▼                      ▼
//!   ConnectionGuard      guards drop as clients leave
//! ```
//!
//! Connection handlers never look at the serving flag: once accepted, a
//! connection is served until the client leaves.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Shared shutdown state.
#[derive(Debug)]
pub struct Shutdown {
    serving: AtomicBool,
    stopped: Notify,
    outstanding: AtomicUsize,
    drained: Notify,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self {
            serving: AtomicBool::new(true),
            stopped: Notify::new(),
            outstanding: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }
}

impl Shutdown {
    /// Creates the shared state in the serving position.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns true until shutdown has been requested.
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Requests shutdown.
    ///
    /// Returns true for the call that actually flipped the flag; later calls
    /// are no-ops and return false.
    pub fn trigger(&self) -> bool {
        let flipped = self.serving.swap(false, Ordering::AcqRel);
        if flipped {
            debug!("Shutdown requested");
            self.stopped.notify_waiters();
        }
        flipped
    }

    /// Completes once shutdown has been requested.
    pub async fn stopped(&self) {
        loop {
            // Register interest before checking so a concurrent trigger
            // cannot slip in between.
            let notified = self.stopped.notified();
            if !self.is_serving() {
                return;
            }
            notified.await;
        }
    }

    /// Counts a new connection.
    ///
    /// The connection stays counted until the returned guard is dropped.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            shutdown: Arc::clone(self),
        }
    }

    /// Returns the number of connections currently counted.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Completes once no connections are outstanding.
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Waits for outstanding connections to finish, at most `timeout` if one
    /// is given.
    ///
    /// Returns the number of connections still open when waiting stopped
    /// (zero when fully drained).
    pub async fn drain(&self, timeout: Option<Duration>) -> usize {
        match timeout {
            Some(limit) => {
                let _ = tokio::time::timeout(limit, self.drained()).await;
            }
            None => self.drained().await,
        }
        self.outstanding()
    }

    fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Keeps one connection counted as outstanding.
///
/// Dropping the guard releases the count exactly once, whichever way the
/// connection ends.
#[derive(Debug)]
pub struct ConnectionGuard {
    shutdown: Arc<Shutdown>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.shutdown.release();
    }
}

/// Resolves when the process receives SIGINT or SIGTERM.
///
/// Returns the name of the signal. If the handlers cannot be installed the
/// future never resolves, so the server keeps running.
#[cfg(unix)]
pub fn termination_signal() -> impl Future<Output = &'static str> + Send {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    async {
        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }
}

/// Resolves when the process receives Ctrl-C.
#[cfg(not(unix))]
pub fn termination_signal() -> impl Future<Output = &'static str> + Send {
    use tracing::error;

    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            return std::future::pending().await;
        }
        "Ctrl-C"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_flips_once() {
        let shutdown = Shutdown::new();
        assert!(shutdown.is_serving());

        assert!(shutdown.trigger());
        assert!(!shutdown.is_serving());

        // Never reverts, and later triggers are no-ops
        assert!(!shutdown.trigger());
        assert!(!shutdown.is_serving());
    }

    #[test]
    fn test_guard_counts_connection() {
        let shutdown = Shutdown::new();

        let first = shutdown.register();
        let second = shutdown.register();
        assert_eq!(shutdown.outstanding(), 2);

        drop(first);
        assert_eq!(shutdown.outstanding(), 1);
        drop(second);
        assert_eq!(shutdown.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_stopped_after_trigger() {
        let shutdown = Shutdown::new();

        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();

        // Already stopped: returns immediately
        shutdown.stopped().await;
    }

    #[tokio::test]
    async fn test_drain_waits_for_guards() {
        let shutdown = Shutdown::new();
        let guard = shutdown.register();

        let drainer = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.drain(None).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!drainer.is_finished());

        drop(guard);
        let remaining = tokio::time::timeout(Duration::from_secs(1), drainer)
            .await
            .expect("drain should finish")
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_outstanding() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.drain(None).await, 0);
    }

    #[tokio::test]
    async fn test_drain_timeout_reports_abandoned() {
        let shutdown = Shutdown::new();
        let _guard = shutdown.register();

        let remaining = shutdown.drain(Some(Duration::from_millis(20))).await;
        assert_eq!(remaining, 1);
    }
}
