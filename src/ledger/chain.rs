// The ledger: chain of sealed blocks plus the pending pool

use crate::consensus::{TransactionValidator, ValidationError};
use crate::core::{
    Block, GENESIS_PREVIOUS_HASH, GENESIS_PROOF, Transaction, now_millis,
};
use crate::ledger::PendingPool;
use crate::storage::{PersistenceError, SnapshotStore};
use crate::wallet::SignatureError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    Validation(#[from] ValidationError),
    #[error("rejected transaction: {0}")]
    Signature(#[from] SignatureError),
    /// The in-memory change stands; only the snapshot write failed
    #[error("ledger changed in memory but was not persisted: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("chain is empty")]
    EmptyChain,
    #[error("refusing to replace the chain with an empty one")]
    EmptyReplacement,
}

/// A sealed transaction with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedTransaction {
    pub transaction_hash: String,
    pub block_index: u64,
    pub block_previous_hash: String,
    pub transaction: Transaction,
}

/// Owns the chain and the pending pool.
///
/// Not internally synchronised: hold it behind a single writer lock when
/// shared (see `network::Node`).
pub struct Ledger {
    chain: Vec<Block>,
    pending: PendingPool,
    store: Box<dyn SnapshotStore>,
}

impl Ledger {
    /// Load the last snapshot, creating the genesis block when there is none
    pub fn open<S: SnapshotStore + 'static>(store: S) -> Result<Self, LedgerError> {
        let snapshot = store.load()?.unwrap_or_default();

        let mut ledger = Self {
            chain: snapshot.chain,
            pending: PendingPool::from_transactions(snapshot.transactions),
            store: Box::new(store),
        };

        if ledger.chain.is_empty() {
            match ledger.seal_block(GENESIS_PROOF, GENESIS_PREVIOUS_HASH) {
                Ok(genesis) => log::info!("Created genesis block {}", genesis.hash_hex()),
                Err(LedgerError::Persistence(e)) => {
                    log::error!("Genesis block created but not persisted: {}", e)
                }
                Err(e) => return Err(e),
            }
        } else {
            log::info!(
                "Loaded chain of {} blocks with {} pending transactions",
                ledger.chain.len(),
                ledger.pending.len()
            );
        }

        Ok(ledger)
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        self.pending.as_slice()
    }

    /// AppendTransaction(tx): returns the index of the block expected to seal it
    pub fn append_transaction(&mut self, tx: Transaction) -> Result<u64, LedgerError> {
        TransactionValidator::validate_fields(&tx)?;
        let next_index = self.last_block()?.index + 1;

        log::debug!(
            "Pending transaction {} -> {} ({} {})",
            tx.sender,
            tx.recipient,
            tx.amount,
            tx.kind
        );
        self.pending.push(tx);
        self.persist()?;

        Ok(next_index)
    }

    /// SealBlock(proof, previous_hash).
    ///
    /// `previous_hash` is recorded as given; checking it is the caller's job.
    pub fn seal_block(
        &mut self,
        proof: u64,
        previous_hash: impl Into<String>,
    ) -> Result<Block, LedgerError> {
        let block = Block::new(
            self.chain.len() as u64 + 1,
            now_millis(),
            self.pending.drain(),
            proof,
            previous_hash,
        );

        self.chain.push(block.clone());
        log::info!(
            "Sealed block {} with {} transactions",
            block.index,
            block.transactions.len()
        );
        self.persist()?;

        Ok(block)
    }

    /// LastBlock()
    pub fn last_block(&self) -> Result<&Block, LedgerError> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    /// ComputeHash(block)
    pub fn compute_hash(block: &Block) -> String {
        block.hash_hex()
    }

    /// Wholesale replacement; the pending pool is kept
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), LedgerError> {
        if chain.is_empty() {
            return Err(LedgerError::EmptyReplacement);
        }
        log::info!(
            "Replacing chain of {} blocks with {} blocks",
            self.chain.len(),
            chain.len()
        );
        self.chain = chain;
        self.persist()?;
        Ok(())
    }

    /// Look up a sealed transaction by receipt hash (case-insensitive)
    pub fn find_transaction(&self, transaction_hash: &str) -> Option<LocatedTransaction> {
        let wanted = transaction_hash.trim().to_ascii_lowercase();
        self.sealed()
            .find(|located| located.transaction_hash == wanted)
    }

    /// Every sealed transaction sent or received by `address`
    pub fn transactions_for(&self, address: &str) -> Vec<LocatedTransaction> {
        self.sealed()
            .filter(|located| located.transaction.involves(address))
            .collect()
    }

    fn sealed(&self) -> impl Iterator<Item = LocatedTransaction> + '_ {
        self.chain.iter().flat_map(|block| {
            block.transactions.iter().map(move |tx| LocatedTransaction {
                transaction_hash: tx.receipt_hash(block.index),
                block_index: block.index,
                block_previous_hash: block.previous_hash.clone(),
                transaction: tx.clone(),
            })
        })
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        self.store.save(&self.chain, self.pending.as_slice())
    }
}
