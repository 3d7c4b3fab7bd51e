//! Thread-Safe In-Memory Store
//!
//! An ordered map behind a single `RwLock`. Keys are kept in a `BTreeMap` so
//! that scans come back in key order, the same order the disk store uses.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MemoryStore                            │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  RwLock<BTreeMap<Bytes, Bytes>>                       │  │
//! │  │  many concurrent readers, one writer at a time        │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │  get_count / set_count / del_count / scan_count (atomics)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A scan snapshots the matching entries under the read lock and then
//! releases it, so a long KEYS listing never blocks writers.

use crate::storage::{KvItem, KvScan, KvStore, StoreError};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Statistics about the in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub scan_ops: u64,
}

/// An in-memory [`KvStore`].
///
/// Nothing is persisted; `flush` is a no-op.
///
/// # Example
///
/// ```
/// use linekv::storage::{KvStore, MemoryStore};
/// use bytes::Bytes;
///
/// let store = MemoryStore::new();
/// store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
/// assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
///
/// store.delete(b"name").unwrap();
/// assert_eq!(store.get(b"name").unwrap(), None);
/// ```
pub struct MemoryStore {
    data: RwLock<BTreeMap<Bytes, Bytes>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DELETE operations
    del_count: AtomicU64,

    /// Statistics: total scans started
    scan_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            scan_count: AtomicU64::new(0),
        }
    }

    /// Returns the number of stored keys.
    ///
    /// Reports zero if the lock has been poisoned.
    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            scan_ops: self.scan_count.load(Ordering::Relaxed),
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let data = self.data.read().map_err(|_| StoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
        data.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
        data.remove(key);
        Ok(())
    }

    fn scan(&self, fetch_values: bool) -> KvScan<'_> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        let data = match self.data.read() {
            Ok(data) => data,
            Err(_) => return Box::new(std::iter::once(Err::<KvItem, _>(StoreError::Poisoned))),
        };

        // Bytes clones are reference-count bumps, not copies
        let snapshot: Vec<KvItem> = data
            .iter()
            .map(|(key, value)| KvItem {
                key: key.clone(),
                value: fetch_values.then(|| value.clone()),
            })
            .collect();

        Box::new(snapshot.into_iter().map(Ok))
    }
}
