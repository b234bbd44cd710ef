//! Nonce search
//!
//! CPU-bound and blocking. Callers on an async runtime run it through
//! `spawn_blocking`. The search is bounded by an attempt count and a
//! wall-clock budget so a misconfigured difficulty cannot spin forever.

use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::PowConfig;
use crate::error::{LedgerError, Result};
use crate::ledger::canonical;
use crate::localchain::block::{meets_difficulty, Block};

/// Give the scheduler a chance every this many attempts.
pub const YIELD_EVERY: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningLimits {
    pub max_attempts: u64,
    pub max_duration: Duration,
}

impl Default for MiningLimits {
    fn default() -> Self {
        let pow = PowConfig::default();
        Self::from(&pow)
    }
}

impl From<&PowConfig> for MiningLimits {
    fn from(pow: &PowConfig) -> Self {
        Self {
            max_attempts: pow.max_attempts,
            max_duration: pow.max_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Miner {
    difficulty: u32,
    limits: MiningLimits,
}

impl Miner {
    pub fn new(difficulty: u32, limits: MiningLimits) -> Self {
        Self { difficulty, limits }
    }

    /// Find a nonce whose block hash has at least `difficulty` leading zero hex
    /// characters. The timestamp is refreshed on every attempt.
    pub fn mine(&self, index: u64, prev_hash: &str, data: &str) -> Result<Block> {
        let started = Instant::now();
        let mut nonce = 0u64;

        loop {
            if nonce >= self.limits.max_attempts {
                return Err(self.timeout(nonce, started));
            }

            let timestamp = Utc::now();
            let preimage = Block::preimage(index, &timestamp, prev_hash, data, nonce);
            let hash = canonical::hash(preimage.as_bytes());

            if meets_difficulty(&hash, self.difficulty) {
                debug!(
                    "Mined block {} after {} attempts in {:?}",
                    index,
                    nonce + 1,
                    started.elapsed()
                );
                return Ok(Block {
                    index,
                    timestamp,
                    prev_hash: prev_hash.to_string(),
                    data: data.to_string(),
                    nonce,
                    hash,
                });
            }

            nonce += 1;
            if nonce % YIELD_EVERY == 0 {
                if started.elapsed() >= self.limits.max_duration {
                    return Err(self.timeout(nonce, started));
                }
                std::thread::yield_now();
            }
        }
    }

    fn timeout(&self, attempts: u64, started: Instant) -> LedgerError {
        LedgerError::MiningTimeout {
            attempts,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }
}
