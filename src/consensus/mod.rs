// Consensus and validation logic

pub mod pow;
pub mod validation;

pub use pow::{CancelFlag, MiningResult, PowError, ProofOfWork, MAX_DIFFICULTY};
pub use validation::{
    ChainIntegrityError, ChainValidator, IntegrityFault, TransactionValidator, ValidationError,
    ValidationMode,
};
