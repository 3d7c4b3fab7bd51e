//! Storage Module
//!
//! The server never talks to a storage engine directly. It is handed a
//! [`KvStore`] at startup and only uses the narrow contract below:
//! get, set, delete, an ordered scan, and flush.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   CommandHandler                            │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ Arc<dyn KvStore>
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!     ┌───────────────────┐     ┌───────────────────┐
//!     │    DiskStore      │     │   MemoryStore     │
//!     │ (fjall keyspace)  │     │ (RwLock BTreeMap) │
//!     └─────────▲─────────┘     └───────────────────┘
//!               │
//!     ┌─────────┴─────────┐
//!     │  JournalFlusher   │
//!     │ (background task) │
//!     └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use linekv::storage::{KvStore, MemoryStore};
//! use bytes::Bytes;
//!
//! let store = MemoryStore::new();
//! store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
//! assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
//!
//! let keys: Vec<_> = store
//!     .scan(false)
//!     .map(|item| item.unwrap().key)
//!     .collect();
//! assert_eq!(keys, vec![Bytes::from("name")]);
//! ```

pub mod disk;
pub mod flusher;
pub mod memory;

use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;

// Re-export commonly used types
pub use disk::DiskStore;
pub use flusher::{FlusherConfig, JournalFlusher};
pub use memory::{MemoryStore, StoreStats};

/// A key and, when requested, its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvItem {
    pub key: Bytes,
    pub value: Option<Bytes>,
}

/// A lazy, ordered, finite sequence of items produced by [`KvStore::scan`].
pub type KvScan<'a> = Box<dyn Iterator<Item = Result<KvItem, StoreError>> + 'a>;

/// The contract the server requires from a key-value store.
///
/// Implementations do their own concurrency control; the server calls them
/// from many connection tasks at once.
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: Bytes, value: Bytes) -> Result<(), StoreError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Iterates over all items in key order.
    ///
    /// Values are only loaded when `fetch_values` is set; otherwise every
    /// item's `value` is `None`. Each call starts a fresh scan.
    fn scan(&self, fetch_values: bool) -> KvScan<'_>;

    /// Makes every acknowledged write durable.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// How eagerly writes reach stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Every write is synced to disk before it is acknowledged.
    Sync,
    /// Writes are buffered and synced periodically by a [`JournalFlusher`].
    #[default]
    Buffered,
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Durability::Sync => f.write_str("sync"),
            Durability::Buffered => f.write_str("buffered"),
        }
    }
}

/// Errors reported by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store path exists but is not a directory
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Failure inside the storage engine
    #[error("storage engine error: {0}")]
    Engine(#[from] fjall::Error),

    /// A lock was poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,
}
