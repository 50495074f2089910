/// Proof of Work for transactions
///
/// Spam deterrence only: a sender must find a nonce whose transaction digest
/// starts with `difficulty` zero hex characters. Finality comes from the
/// consensus vote, not from the work.
use fba_common::mining::MAX_DIFFICULTY;
use fba_common::TxHash;
use std::sync::atomic::{AtomicBool, Ordering};

/// How often the search loop checks its cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Result of a successful nonce search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Nonce found during mining
    pub nonce: u64,

    /// Difficulty (number of leading zero hex characters required)
    pub difficulty: u32,

    /// Digest produced by `nonce`
    pub hash: TxHash,

    /// Number of digests computed to find `nonce`
    pub iterations: u64,
}

impl ProofOfWork {
    /// Search nonces from `start_nonce` upwards until `hash_fn(nonce)` meets `difficulty`
    ///
    /// Stops after `max_iterations` digests or when `cancel` is raised.
    pub fn search<F>(
        start_nonce: u64,
        difficulty: u32,
        max_iterations: u64,
        cancel: &AtomicBool,
        hash_fn: F,
    ) -> Result<Self, PowError>
    where
        F: Fn(u64) -> TxHash,
    {
        if difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyTooHigh(difficulty));
        }

        let mut nonce = start_nonce;
        let mut iterations = 0u64;

        loop {
            if iterations >= max_iterations {
                return Err(PowError::Exhausted { iterations });
            }

            if iterations % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return Err(PowError::Cancelled { iterations });
            }

            let hash = hash_fn(nonce);
            iterations += 1;

            if Self::meets_difficulty(&hash, difficulty) {
                return Ok(Self {
                    nonce,
                    difficulty,
                    hash,
                    iterations,
                });
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(PowError::Exhausted { iterations })?;
        }
    }

    /// Whether `hash` has at least `difficulty` leading zero hex characters
    pub fn meets_difficulty(hash: &TxHash, difficulty: u32) -> bool {
        hash.leading_zero_nibbles() >= difficulty
    }

    /// Expected number of digests needed for `difficulty`
    pub fn expected_iterations(difficulty: u32) -> u64 {
        16u64.saturating_pow(difficulty)
    }
}

/// Proof-of-work search failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowError {
    #[error("Difficulty {0} exceeds the 64 hex characters of a digest")]
    DifficultyTooHigh(u32),

    #[error("No valid nonce within {iterations} iterations")]
    Exhausted { iterations: u64 },

    #[error("Mining cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },
}
