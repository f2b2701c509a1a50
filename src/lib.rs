// Hash-chained contribution ledger
//
// Blocks link to their predecessor by SHA256 digest and are sealed with a
// proof-of-work answer; nodes converge on the longest valid chain.

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod ledger;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use cli::{Cli, CliHandler, Commands};
pub use config::{ConfigError, NodeConfig};
pub use consensus::{CancelFlag, ChainValidator, ProofOfWork, ValidationMode};
pub use core::{Address, Amount, Block, Transaction, TransactionKind};
pub use ledger::{Ledger, LedgerError};
pub use network::{ConflictResolver, HttpPeerClient, Node, NodeError, PeerClient};
pub use storage::{FileStore, MemoryStore, SnapshotStore};
pub use wallet::{KeyPair, Keystore};
