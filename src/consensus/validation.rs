// Transaction and chain validation

use crate::consensus::pow::ProofOfWork;
use crate::core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transaction rejected before pool admission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
}

/// Transaction validator (for pool admission)
pub struct TransactionValidator;

impl TransactionValidator {
    /// Sender and recipient present and `amount > 0`; self-transfers are allowed
    pub fn validate_fields(tx: &Transaction) -> Result<(), ValidationError> {
        if tx.sender.is_empty() {
            return Err(ValidationError::MissingField("sender"));
        }
        if tx.recipient.is_empty() {
            return Err(ValidationError::MissingField("recipient"));
        }
        if !tx.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }
}

/// Where a chain stopped linking up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFault {
    PreviousHashMismatch,
    InvalidProof,
}

impl fmt::Display for IntegrityFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IntegrityFault::PreviousHashMismatch => write!(f, "previous hash mismatch"),
            IntegrityFault::InvalidProof => write!(f, "invalid proof"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{fault} at chain position {position} (block index {index})")]
pub struct ChainIntegrityError {
    /// Zero-based position in the chain
    pub position: usize,
    /// The block's own `index` field
    pub index: u64,
    pub fault: IntegrityFault,
}

/// How strictly candidate chains are audited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Check hash links and proofs
    #[default]
    Strict,
    /// Accept every chain (demo nodes)
    Permissive,
}

/// Chain validator; a pure function over a chain value
#[derive(Debug, Clone, Copy)]
pub struct ChainValidator {
    pow: ProofOfWork,
    mode: ValidationMode,
}

impl ChainValidator {
    pub fn new(pow: ProofOfWork, mode: ValidationMode) -> Self {
        Self { pow, mode }
    }

    pub fn strict(pow: ProofOfWork) -> Self {
        Self::new(pow, ValidationMode::Strict)
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// IsValid(chain)
    pub fn is_valid(&self, chain: &[Block]) -> bool {
        self.validate(chain).is_ok()
    }

    /// Like [`is_valid`](Self::is_valid) but reports the first failure
    pub fn validate(&self, chain: &[Block]) -> Result<(), ChainIntegrityError> {
        if self.mode == ValidationMode::Permissive {
            return Ok(());
        }

        for (position, pair) in chain.windows(2).enumerate() {
            let (previous, block) = (&pair[0], &pair[1]);
            let fault = if block.previous_hash != previous.hash_hex() {
                Some(IntegrityFault::PreviousHashMismatch)
            } else if !self.pow.valid_proof(previous.proof, block.proof) {
                Some(IntegrityFault::InvalidProof)
            } else {
                None
            };

            if let Some(fault) = fault {
                let err = ChainIntegrityError {
                    position: position + 1,
                    index: block.index,
                    fault,
                };
                log::debug!("Chain rejected: {}", err);
                return Err(err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, GENESIS_PREVIOUS_HASH, GENESIS_PROOF, TransactionKind};

    fn tx(amount: u64) -> Transaction {
        Transaction::new(
            "A",
            "B",
            Amount::from_whole(amount).unwrap(),
            TransactionKind::Transfer,
            1000,
        )
    }

    fn build_chain(pow: &ProofOfWork, len: usize) -> Vec<Block> {
        let mut chain = vec![Block::new(1, 1, vec![], GENESIS_PROOF, GENESIS_PREVIOUS_HASH)];
        while chain.len() < len {
            let last = chain.last().unwrap();
            let proof = pow.find_proof(last.proof).unwrap();
            let block = Block::new(last.index + 1, 2, vec![tx(last.index)], proof, last.hash_hex());
            chain.push(block);
        }
        chain
    }

    #[test]
    fn test_validate_fields() {
        assert!(TransactionValidator::validate_fields(&tx(10)).is_ok());

        let mut zero = tx(10);
        zero.amount = Amount::from_units(0);
        assert_eq!(
            TransactionValidator::validate_fields(&zero),
            Err(ValidationError::NonPositiveAmount)
        );

        let mut no_sender = tx(10);
        no_sender.sender = "".into();
        assert_eq!(
            TransactionValidator::validate_fields(&no_sender),
            Err(ValidationError::MissingField("sender"))
        );

        let mut self_transfer = tx(10);
        self_transfer.recipient = self_transfer.sender.clone();
        assert!(TransactionValidator::validate_fields(&self_transfer).is_ok());

        // the epoch is an ordinary timestamp
        let mut epoch = tx(10);
        epoch.timestamp = 0;
        assert!(TransactionValidator::validate_fields(&epoch).is_ok());
    }

    #[test]
    fn test_short_chains_are_valid() {
        let validator = ChainValidator::strict(ProofOfWork::new(2).unwrap());
        assert!(validator.is_valid(&[]));
        assert!(validator.is_valid(&build_chain(&ProofOfWork::permissive(), 1)));
    }

    #[test]
    fn test_mined_chain_is_valid() {
        let pow = ProofOfWork::new(2).unwrap();
        let chain = build_chain(&pow, 4);
        assert!(ChainValidator::strict(pow).is_valid(&chain));
    }

    #[test]
    fn test_tampered_transaction_breaks_link() {
        let pow = ProofOfWork::new(1).unwrap();
        let mut chain = build_chain(&pow, 4);
        chain[1].transactions[0].amount = Amount::from_whole(999).unwrap();

        let err = ChainValidator::strict(pow).validate(&chain).unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.fault, IntegrityFault::PreviousHashMismatch);
    }

    #[test]
    fn test_bad_proof_detected() {
        let pow = ProofOfWork::new(2).unwrap();
        let mut chain = build_chain(&ProofOfWork::permissive(), 3);
        // relink with proofs that (almost certainly) fail difficulty 2
        let mut proof = 0;
        while pow.valid_proof(chain[0].proof, proof) {
            proof += 1;
        }
        chain[1].proof = proof;
        chain[2].previous_hash = chain[1].hash_hex();

        let err = ChainValidator::strict(pow).validate(&chain).unwrap_err();
        assert_eq!(err.fault, IntegrityFault::InvalidProof);
        assert_eq!(err.index, 2);
    }

    #[test]
    fn test_permissive_mode_accepts_anything() {
        let mut chain = build_chain(&ProofOfWork::permissive(), 3);
        chain[2].previous_hash = "garbage".to_string();
        let validator = ChainValidator::new(ProofOfWork::new(3).unwrap(), ValidationMode::Permissive);
        assert!(validator.is_valid(&chain));
        assert!(!ChainValidator::strict(ProofOfWork::permissive()).is_valid(&chain));
    }
}
