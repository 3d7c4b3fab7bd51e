//! Background Journal Flusher
//!
//! In buffered durability mode, SET and DELETE return as soon as the write
//! reaches the store's journal buffer. This module runs a background task
//! that periodically calls [`KvStore::flush`] so buffered writes reach the
//! disk within a bounded window.
//!
//! ## Design
//!
//! The flusher runs as a Tokio task and:
//! 1. Sleeps for the configured interval
//! 2. Flushes the store
//! 3. Logs failures and keeps going; a later flush may succeed
//!
//! The task stops when its handle is stopped or dropped. Stopping does not
//! flush; the server performs a final flush itself once connections have
//! drained.

use crate::storage::KvStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Configuration for the journal flusher.
#[derive(Debug, Clone)]
pub struct FlusherConfig {
    /// Time between flushes (default: 1s)
    pub interval: Duration,
}

impl Default for FlusherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running flusher.
///
/// When this handle is dropped, the flusher task will be stopped.
#[derive(Debug)]
pub struct JournalFlusher {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Number of flushes completed successfully
    flushes: Arc<AtomicU64>,
}

impl JournalFlusher {
    /// Starts the flusher as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use linekv::storage::{DiskStore, Durability, FlusherConfig, JournalFlusher};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(DiskStore::open("/tmp/linekv", Durability::Buffered)?);
    /// let flusher = JournalFlusher::start(store, FlusherConfig::default());
    ///
    /// // Flusher runs in the background...
    ///
    /// // Dropping the flusher will stop it
    /// drop(flusher);
    /// ```
    pub fn start(store: Arc<dyn KvStore>, config: FlusherConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let flushes = Arc::new(AtomicU64::new(0));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background journal flusher started"
        );

        tokio::spawn(flusher_loop(
            store,
            config,
            shutdown_rx,
            Arc::clone(&flushes),
        ));

        Self {
            shutdown_tx,
            flushes,
        }
    }

    /// Returns how many periodic flushes have succeeded so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Stops the flusher.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        // send_replace succeeds even when the task has already exited
        if !self.shutdown_tx.send_replace(true) {
            info!("Background journal flusher stopped");
        }
    }
}

impl Drop for JournalFlusher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main flusher loop.
async fn flusher_loop(
    store: Arc<dyn KvStore>,
    config: FlusherConfig,
    mut shutdown_rx: watch::Receiver<bool>,
    flushes: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Journal flusher received shutdown signal");
                    return;
                }
            }
        }

        match store.flush() {
            Ok(()) => {
                flushes.fetch_add(1, Ordering::Relaxed);
                trace!("Journal flushed");
            }
            Err(e) => warn!(error = %e, "Periodic journal flush failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvScan, StoreError};
    use bytes::Bytes;

    /// A store that only counts flushes.
    #[derive(Debug, Default)]
    struct CountingStore {
        flushes: AtomicU64,
    }

    impl KvStore for CountingStore {
        fn get(&self, _key: &[u8]) -> Result<Option<Bytes>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: Bytes, _value: Bytes) -> Result<(), StoreError> {
            Ok(())
        }

        fn delete(&self, _key: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        fn scan(&self, _fetch_values: bool) -> KvScan<'_> {
            Box::new(std::iter::empty())
        }

        fn flush(&self) -> Result<(), StoreError> {
            self.flushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_flusher_flushes_periodically() {
        let store = Arc::new(CountingStore::default());

        let config = FlusherConfig {
            interval: Duration::from_millis(10),
        };
        let flusher = JournalFlusher::start(store.clone(), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.flushes.load(Ordering::Relaxed) >= 2);
        assert!(flusher.flush_count() >= 2);
    }

    #[tokio::test]
    async fn test_flusher_stops_on_drop() {
        let store = Arc::new(CountingStore::default());

        let config = FlusherConfig {
            interval: Duration::from_millis(10),
        };

        {
            let _flusher = JournalFlusher::start(store.clone(), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Flusher is dropped here
        }

        // Let the task observe the signal
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = store.flushes.load(Ordering::Relaxed);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.flushes.load(Ordering::Relaxed), after_stop);
    }

    #[tokio::test]
    async fn test_flusher_syncs_disk_store() {
        use crate::storage::{DiskStore, Durability};

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskStore::open(dir.path(), Durability::Buffered).unwrap());
        store.set(Bytes::from("k"), Bytes::from("v")).unwrap();

        let config = FlusherConfig {
            interval: Duration::from_millis(10),
        };
        let flusher = JournalFlusher::start(store.clone(), config);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(flusher.flush_count() >= 1);
    }
}
