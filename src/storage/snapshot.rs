// Durable ledger snapshots
//
// The snapshot is a single JSON document `{ "chain": [...], "transactions": [...] }`
// rewritten wholesale after every mutation.

use crate::core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Everything the ledger needs to restart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub chain: Vec<Block>,
    /// Pending pool
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    chain: &'a [Block],
    transactions: &'a [Transaction],
}

/// Persistence adapter used by the ledger
pub trait SnapshotStore: Send + Sync {
    /// `None` when nothing usable has been stored yet
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    fn save(&self, chain: &[Block], pending: &[Transaction]) -> Result<(), PersistenceError>;
}

/// JSON file written through a temp file and an atomic rename
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub const DEFAULT_FILE_NAME: &'static str = "blockchain_data.json";

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// `<data_dir>/blockchain_data.json`
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join(Self::DEFAULT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        // a panic mid-write leaves no partial file behind, so the guard is still usable
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let _guard = self.exclusive();

        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_slice::<Snapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable snapshot {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, chain: &[Block], pending: &[Transaction]) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(&SnapshotRef {
            chain,
            transactions: pending,
        })?;

        let _guard = self.exclusive();

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&json).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        log::trace!("Snapshot written to {}", self.path.display());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    snapshot: Mutex<Option<Snapshot>>,
    fail_writes: AtomicBool,
    writes: std::sync::atomic::AtomicU64,
}

/// In-memory store (for testing); clones share state
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        *store.slot() = Some(snapshot);
        store
    }

    /// Make every subsequent `save` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Most recently saved snapshot
    pub fn current(&self) -> Option<Snapshot> {
        self.slot().clone()
    }

    /// Number of successful saves
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.inner
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(self.current())
    }

    fn save(&self, chain: &[Block], pending: &[Transaction]) -> Result<(), PersistenceError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("writes disabled".to_string()));
        }
        *self.slot() = Some(Snapshot {
            chain: chain.to_vec(),
            transactions: pending.to_vec(),
        });
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, GENESIS_PREVIOUS_HASH, GENESIS_PROOF, TransactionKind};

    fn genesis() -> Block {
        Block::new(1, 1, vec![], GENESIS_PROOF, GENESIS_PREVIOUS_HASH)
    }

    fn pending_tx() -> Transaction {
        Transaction::new(
            "A",
            "B",
            Amount::from_whole(3).unwrap(),
            TransactionKind::Credit,
            77,
        )
    }

    #[test]
    fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().join("nested"));

        store.save(&[genesis()], &[pending_tx()]).unwrap();
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.chain, vec![genesis()]);
        assert_eq!(snapshot.transactions, vec![pending_tx()]);

        // overwritten wholesale
        store.save(&[genesis()], &[]).unwrap();
        assert!(store.load().unwrap().unwrap().transactions.is_empty());
    }

    #[test]
    fn test_file_store_snapshot_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.save(&[genesis()], &[]).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["chain"][0]["previous_hash"], "1");
        assert_eq!(value["chain"][0]["proof"], 100);
        assert!(value["transactions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        std::fs::write(store.path(), b"{ not json").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_failures() {
        let store = MemoryStore::new();
        store.save(&[genesis()], &[]).unwrap();
        assert_eq!(store.write_count(), 1);

        store.set_fail_writes(true);
        assert!(matches!(
            store.save(&[], &[]),
            Err(PersistenceError::Unavailable(_))
        ));
        assert_eq!(store.current().unwrap().chain.len(), 1);
    }
}
