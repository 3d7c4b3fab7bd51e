//! Persistent Disk Store
//!
//! A [`KvStore`] backed by a `fjall` LSM keyspace living in the store
//! directory. All items are kept in one partition.
//!
//! ## Durability
//!
//! - [`Durability::Sync`]: the journal is fsynced after every SET and DELETE,
//!   before the client sees `OK`.
//! - [`Durability::Buffered`]: writes land in the journal buffer and are
//!   synced by a [`JournalFlusher`](crate::storage::JournalFlusher) on a
//!   timer, and once more at shutdown.

use crate::storage::{Durability, KvItem, KvScan, KvStore, StoreError};
use bytes::Bytes;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the partition holding all items.
const ITEMS_PARTITION: &str = "items";

/// A [`KvStore`] persisted on disk.
pub struct DiskStore {
    keyspace: Keyspace,
    items: PartitionHandle,
    durability: Durability,
    path: PathBuf,
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("path", &self.path)
            .field("durability", &self.durability)
            .finish()
    }
}

impl DiskStore {
    /// Opens (or creates) the store in `path`.
    ///
    /// The directory is created if it does not exist. If `path` exists but
    /// is not a directory, opening fails.
    pub fn open(path: impl AsRef<Path>, durability: Durability) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        prepare_directory(&path)?;

        let keyspace = Config::new(&path).open()?;
        let items = keyspace.open_partition(ITEMS_PARTITION, PartitionCreateOptions::default())?;

        info!(path = %path.display(), durability = %durability, "Disk store opened");

        Ok(Self {
            keyspace,
            items,
            durability,
            path,
        })
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the durability mode the store was opened with.
    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Syncs the journal after a write when running in sync mode.
    fn after_write(&self) -> Result<(), StoreError> {
        if self.durability == Durability::Sync {
            self.keyspace.persist(PersistMode::SyncAll)?;
        }
        Ok(())
    }
}

/// Makes sure `path` is a directory, creating it if needed.
fn prepare_directory(path: &Path) -> Result<(), StoreError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Creating store directory");
            std::fs::create_dir_all(path)?;
            Ok(())
        }
        Err(e) => Err(StoreError::Io(e)),
    }
}

impl KvStore for DiskStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        let value = self.items.get(key)?;
        Ok(value.map(|slice| Bytes::copy_from_slice(&slice)))
    }

    fn set(&self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        self.items.insert(key.as_ref(), value.as_ref())?;
        self.after_write()
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.items.remove(key)?;
        self.after_write()
    }

    fn scan(&self, fetch_values: bool) -> KvScan<'_> {
        if fetch_values {
            Box::new(self.items.iter().map(|pair| -> Result<KvItem, StoreError> {
                let (key, value) = pair?;
                Ok(KvItem {
                    key: Bytes::copy_from_slice(&key),
                    value: Some(Bytes::copy_from_slice(&value)),
                })
            }))
        } else {
            Box::new(self.items.keys().map(|key| -> Result<KvItem, StoreError> {
                let key = key?;
                Ok(KvItem {
                    key: Bytes::copy_from_slice(&key),
                    value: None,
                })
            }))
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path(), Durability::Buffered).unwrap();

        assert_eq!(store.get(b"name").unwrap(), None);

        store.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
        assert_eq!(store.get(b"name").unwrap(), Some(Bytes::from("Ariz")));

        store.delete(b"name").unwrap();
        assert_eq!(store.get(b"name").unwrap(), None);
    }

    #[test]
    fn test_scan_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path(), Durability::Buffered).unwrap();

        for key in ["user:2", "user:10", "admin", "user:1"] {
            store.set(Bytes::from(key), Bytes::from("v")).unwrap();
        }

        let keys: Vec<Bytes> = store.scan(false).map(|item| item.unwrap().key).collect();
        assert_eq!(
            keys,
            vec![
                Bytes::from("admin"),
                Bytes::from("user:1"),
                Bytes::from("user:10"),
                Bytes::from("user:2"),
            ]
        );

        let items: Vec<KvItem> = store.scan(true).map(|item| item.unwrap()).collect();
        assert!(items.iter().all(|item| item.value == Some(Bytes::from("v"))));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = DiskStore::open(&nested, Durability::Sync).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.path(), nested.as_path());
        assert_eq!(store.durability(), Durability::Sync);
    }

    #[test]
    fn test_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = DiskStore::open(&file, Durability::Buffered).unwrap_err();
        assert!(matches!(err, StoreError::NotADirectory(_)));
    }

    #[test]
    fn test_sync_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = DiskStore::open(dir.path(), Durability::Sync).unwrap();
            store.set(Bytes::from("k"), Bytes::from("v")).unwrap();
            store.set(Bytes::from("gone"), Bytes::from("v")).unwrap();
            store.delete(b"gone").unwrap();
        }

        let store = DiskStore::open(dir.path(), Durability::Sync).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(Bytes::from("v")));
        assert_eq!(store.get(b"gone").unwrap(), None);
    }

    #[test]
    fn test_flushed_buffered_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = DiskStore::open(dir.path(), Durability::Buffered).unwrap();
            store.set(Bytes::from("k"), Bytes::from("v")).unwrap();
            store.flush().unwrap();
        }

        let store = DiskStore::open(dir.path(), Durability::Buffered).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(Bytes::from("v")));
    }
}
