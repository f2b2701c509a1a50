// Block data structures

use crate::core::{Canonical, CanonicalWriter, Digest256, Transaction, UnixMillis, hash_of};
use serde::{Deserialize, Serialize};

/// Proof recorded in the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// `previous_hash` sentinel carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Hash-linked batch of transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, starting at 1
    pub index: u64,
    /// Seal time
    pub timestamp: UnixMillis,
    /// Transactions in pool order
    pub transactions: Vec<Transaction>,
    /// Proof-of-work answer for the previous block's proof
    pub proof: u64,
    /// Hex digest of the previous block, or "1" for genesis
    pub previous_hash: String,
}

impl Block {
    /// Create a new block
    pub fn new(
        index: u64,
        timestamp: UnixMillis,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash: previous_hash.into(),
        }
    }

    /// HashOf(block)
    pub fn hash(&self) -> Digest256 {
        hash_of(self)
    }

    /// Hex digest, the form stored in the next block's `previous_hash`
    pub fn hash_hex(&self) -> String {
        self.hash().to_hex()
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

impl Canonical for Block {
    fn write_canonical(&self, out: &mut CanonicalWriter) {
        out.begin_object()
            .field_u64("index", self.index)
            .field_u64("timestamp", self.timestamp)
            .field("transactions", &self.transactions[..])
            .field_u64("proof", self.proof)
            .field_str("previous_hash", &self.previous_hash)
            .end_object();
    }
}
