//! Local Proof-of-Work Chain
//!
//! A single-writer, file-based chain that gives ledger anchoring a
//! proof-of-work gate without any external dependency.

pub mod block;
pub mod chain;
pub mod miner;

pub use block::{Block, GENESIS_DATA};
pub use chain::ProofOfWorkChain;
pub use miner::{Miner, MiningLimits};
