// Pending transactions awaiting a block

use crate::core::Transaction;

/// Not-yet-sealed transactions in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPool {
    transactions: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Empty the pool, returning its contents in insertion order
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
