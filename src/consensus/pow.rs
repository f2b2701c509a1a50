// Proof of Work implementation

use crate::core::sha256;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of hex digits in a SHA256 digest
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("proof search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("difficulty {0} exceeds {max}", max = MAX_DIFFICULTY)]
    DifficultyTooHigh(u32),
    #[error("no proof in the u64 range answers previous proof {previous_proof}")]
    Exhausted { previous_proof: u64 },
}

/// Shared flag checked between proof candidates
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Proof-of-work engine.
///
/// A proof is valid when `SHA256("{previous_proof}{proof}")` starts with
/// `difficulty` zero hex digits. Difficulty 0 accepts every proof and the
/// search answers 0 immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    /// Create an engine with a fixed difficulty
    pub fn new(difficulty: u32) -> Result<Self, PowError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyTooHigh(difficulty));
        }
        Ok(Self { difficulty })
    }

    /// Engine that accepts every proof
    pub fn permissive() -> Self {
        Self { difficulty: 0 }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// ValidProof(previous_proof, proof)
    pub fn valid_proof(&self, previous_proof: u64, proof: u64) -> bool {
        if self.difficulty == 0 {
            return true;
        }
        let guess = format!("{}{}", previous_proof, proof);
        let digest = sha256(guess.as_bytes());
        Self::has_leading_zero_nibbles(digest.as_bytes(), self.difficulty)
    }

    /// FindProof(previous_proof); runs until an answer exists
    pub fn find_proof(&self, previous_proof: u64) -> Result<u64, PowError> {
        self.find_proof_cancellable(previous_proof, &CancelFlag::new())
            .map(|result| result.proof)
    }

    /// Linear search from 0, checking `cancel` before every candidate
    pub fn find_proof_cancellable(
        &self,
        previous_proof: u64,
        cancel: &CancelFlag,
    ) -> Result<MiningResult, PowError> {
        let start_time = Instant::now();
        let mut attempts = 0u64;

        for proof in 0..=u64::MAX {
            if cancel.is_cancelled() {
                log::debug!("Proof search cancelled after {} attempts", attempts);
                return Err(PowError::Cancelled { attempts });
            }

            attempts += 1;
            if self.valid_proof(previous_proof, proof) {
                return Ok(MiningResult {
                    proof,
                    attempts,
                    duration: start_time.elapsed(),
                });
            }

            // Progress indicator every 100k attempts
            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!(
                    "Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }

        Err(PowError::Exhausted { previous_proof })
    }

    fn has_leading_zero_nibbles(digest: &[u8; 32], nibbles: u32) -> bool {
        let nibbles = nibbles as usize;
        let full_bytes = nibbles / 2;
        if digest[..full_bytes].iter().any(|b| *b != 0) {
            return false;
        }
        nibbles % 2 == 0 || digest[full_bytes] >> 4 == 0
    }
}

/// Mining result
#[derive(Debug, Clone, Copy)]
pub struct MiningResult {
    /// The proof that was found
    pub proof: u64,
    /// Number of candidates tried
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        self.attempts as f64 / self.duration.as_secs_f64().max(f64::EPSILON)
    }
}
