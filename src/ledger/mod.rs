// Ledger state: sealed chain and pending pool

mod chain;
mod pool;

pub use chain::{Ledger, LedgerError, LocatedTransaction};
pub use pool::PendingPool;
