// Storage layer for ledger snapshots

mod snapshot;

pub use snapshot::{FileStore, MemoryStore, PersistenceError, Snapshot, SnapshotStore};
