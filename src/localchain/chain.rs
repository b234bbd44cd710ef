//! File-backed proof-of-work chain
//!
//! Same linkage discipline as the plain ledgers, with a materialized genesis
//! block and a difficulty requirement on every mined block. Difficulty is read
//! live at verification time: changing it on a live chain invalidates blocks
//! mined under a lower setting.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PowConfig;
use crate::error::{LedgerError, Result};
use crate::ledger::canonical;
use crate::ledger::storage::{JsonlStore, StoredLine};
use crate::ledger::{ChainVerification, GENESIS_SENTINEL};
use crate::localchain::block::{meets_difficulty, Block};
use crate::localchain::miner::{Miner, MiningLimits};

#[derive(Clone)]
pub struct ProofOfWorkChain {
    store: JsonlStore,
    difficulty: Arc<AtomicU32>,
    limits: MiningLimits,
    writer: Arc<Mutex<()>>,
}

impl ProofOfWorkChain {
    pub fn new(path: impl Into<PathBuf>, difficulty: u32, limits: MiningLimits) -> Self {
        Self {
            store: JsonlStore::new(path),
            difficulty: Arc::new(AtomicU32::new(difficulty.max(1))),
            limits,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(path: impl Into<PathBuf>, pow: &PowConfig) -> Self {
        Self::new(path, pow.difficulty, MiningLimits::from(pow))
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::Relaxed)
    }

    pub fn set_difficulty(&self, difficulty: u32) {
        self.difficulty.store(difficulty.max(1), Ordering::Relaxed);
    }

    /// Materialize the genesis block if the chain is empty, or replace an
    /// unreadable first line with a fresh genesis. Idempotent.
    pub async fn ensure_genesis(&self) -> Result<Block> {
        let _guard = self.writer.lock().await;
        self.ensure_genesis_locked()
    }

    fn ensure_genesis_locked(&self) -> Result<Block> {
        self.store.ensure_parent()?;

        let first = self.store.entries()?.into_iter().next();
        match first {
            None => {
                let genesis = Block::genesis();
                self.store.append_line(&serde_json::to_string(&genesis)?)?;
                info!("Created local chain genesis block {}", genesis.hash);
                Ok(genesis)
            }
            Some(StoredLine::Record { value, line }) => {
                match serde_json::from_value::<Block>(value) {
                    Ok(block) => Ok(block),
                    Err(e) => self.repair_genesis(line, &e.to_string()),
                }
            }
            Some(StoredLine::Corrupt { line, reason }) => self.repair_genesis(line, &reason),
        }
    }

    fn repair_genesis(&self, line: usize, reason: &str) -> Result<Block> {
        warn!(
            "Local chain first line {} unreadable ({}); writing a fresh genesis in its place",
            line, reason
        );
        let genesis = Block::genesis();
        self.store.replace_first_line(&serde_json::to_string(&genesis)?)?;
        Ok(genesis)
    }

    /// Mine `data` into the next block and append it.
    pub async fn append(&self, data: &str) -> Result<Block> {
        let _guard = self.writer.lock().await;
        self.ensure_genesis_locked()?;

        let (index, prev_hash) = match self.store.last::<Block>()? {
            Some(tip) => (tip.index + 1, tip.hash),
            None => (1, GENESIS_SENTINEL.to_string()),
        };

        let miner = Miner::new(self.difficulty(), self.limits);
        let payload = data.to_string();
        let block = tokio::task::spawn_blocking(move || miner.mine(index, &prev_hash, &payload))
            .await
            .map_err(|e| LedgerError::unavailable("Mining task failed", e))??;

        self.store.append_line(&serde_json::to_string(&block)?)?;
        info!("Appended local chain block {} ({})", block.index, block.hash);
        Ok(block)
    }

    /// Check hashes, linkage and difficulty from genesis to tip. Hashes are
    /// recomputed over the stored field text, so any edit to a stored line
    /// breaks the chain even when it parses to the same value.
    pub fn verify(&self) -> Result<ChainVerification> {
        let difficulty = self.difficulty();
        let mut prev_hash = GENESIS_SENTINEL.to_string();
        let mut count = 0u64;

        for entry in self.store.entries()? {
            let value = match entry {
                StoredLine::Record { value, .. } => value,
                StoredLine::Corrupt { line, reason } => {
                    warn!("Local chain corrupt at line {}: {}", line, reason);
                    return Ok(ChainVerification::broken(count));
                }
            };

            match check_block(&value, count, &prev_hash, difficulty) {
                Ok(hash) => prev_hash = hash,
                Err(reason) => {
                    warn!("Local chain broken at block {}: {}", count, reason);
                    return Ok(ChainVerification::broken(count));
                }
            }
            count += 1;
        }

        debug!("Local chain verified: {} blocks at difficulty {}", count, difficulty);
        Ok(ChainVerification::intact(count))
    }

    /// Last well-formed block.
    pub fn tip(&self) -> Result<Option<Block>> {
        self.store.last()
    }

    pub fn tail(&self, n: usize) -> Result<Vec<Block>> {
        let mut blocks = self.store.scan::<Block>()?;
        let skip = blocks.len().saturating_sub(n);
        Ok(blocks.split_off(skip))
    }

    /// First block, oldest first, carrying exactly `data`.
    pub fn find_by_data(&self, data: &str) -> Result<Option<Block>> {
        Ok(self
            .store
            .scan::<Block>()?
            .into_iter()
            .find(|block| block.data == data))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.scan::<Block>()?.len())
    }
}

/// Validate one stored block and return its hash.
fn check_block(
    value: &Value,
    expected_index: u64,
    expected_prev: &str,
    difficulty: u32,
) -> std::result::Result<String, String> {
    let text = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("missing or non-string {}", field))
    };
    let number = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_u64)
            .ok_or_else(|| format!("missing or non-integer {}", field))
    };

    let index = number("index")?;
    let nonce = number("nonce")?;
    let timestamp = text("timestamp")?;
    let prev_hash = text("prev_hash")?;
    let data = text("data")?;
    let hash = text("hash")?;

    if index != expected_index {
        return Err(format!("expected index {}, found {}", expected_index, index));
    }
    if serde_json::from_value::<Block>(value.clone()).is_err() {
        return Err("unexpected block shape".to_string());
    }

    let preimage = Block::stored_preimage(index, timestamp, prev_hash, data, nonce);
    if canonical::hash(preimage.as_bytes()) != hash {
        return Err(format!("hash {} does not match contents", hash));
    }
    if index == 0 {
        if prev_hash != GENESIS_SENTINEL {
            return Err("genesis block does not carry the sentinel".to_string());
        }
        return Ok(hash.to_string());
    }
    if prev_hash != expected_prev {
        return Err(format!(
            "prev_hash {} does not link to {}",
            prev_hash, expected_prev
        ));
    }
    if !meets_difficulty(hash, difficulty) {
        return Err(format!(
            "hash {} has fewer than {} leading zeros",
            hash, difficulty
        ));
    }
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn chain(dir: &Path, difficulty: u32) -> ProofOfWorkChain {
        ProofOfWorkChain::new(dir.join("blocks.jsonl"), difficulty, MiningLimits::default())
    }

    #[tokio::test]
    async fn test_ensure_genesis_is_idempotent() {
        let dir = tempdir().unwrap();
        let chain = chain(dir.path(), 1);

        let first = chain.ensure_genesis().await.unwrap();
        let again = chain.ensure_genesis().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(chain.len().unwrap(), 1);
        assert_eq!(chain.verify().unwrap(), ChainVerification::intact(1));
    }

    #[tokio::test]
    async fn test_append_mines_after_genesis() {
        let dir = tempdir().unwrap();
        let chain = chain(dir.path(), 1);

        let block = chain.append("hash-X").await.unwrap();
        assert_eq!(block.index, 1);
        assert!(block.hash.starts_with('0'));

        let genesis = chain.tail(2).unwrap().remove(0);
        assert_eq!(block.prev_hash, genesis.hash);
        assert_eq!(chain.tip().unwrap().unwrap(), block);
        assert_eq!(chain.verify().unwrap(), ChainVerification::intact(2));
    }

    #[tokio::test]
    async fn test_unreadable_first_line_is_replaced_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        fs::write(&path, "not json\n{\"keep\":\"me\"}\n").unwrap();

        let chain = chain(dir.path(), 1);
        let genesis = chain.ensure_genesis().await.unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(serde_json::from_str::<Block>(lines[0]).unwrap(), genesis);
        assert_eq!(lines[1], "{\"keep\":\"me\"}");
    }

    #[tokio::test]
    async fn test_microsecond_timestamps_verify_as_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.jsonl");
        let timestamp = "2024-01-01T00:00:00.120000Z";
        let hash = canonical::hash(
            Block::stored_preimage(0, timestamp, GENESIS_SENTINEL, "GENESIS", 0).as_bytes(),
        );
        fs::write(
            &path,
            format!(
                "{{\"index\":0,\"timestamp\":\"{}\",\"prev_hash\":\"GENESIS\",\"data\":\"GENESIS\",\"nonce\":0,\"hash\":\"{}\"}}\n",
                timestamp, hash
            ),
        )
        .unwrap();

        let chain = chain(dir.path(), 1);
        assert_eq!(chain.verify().unwrap(), ChainVerification::intact(1));

        let block = chain.append("hash-X").await.unwrap();
        assert_eq!(block.prev_hash, hash);
        assert_eq!(chain.verify().unwrap(), ChainVerification::intact(2));
    }

    #[tokio::test]
    async fn test_rewritten_timestamp_text_breaks_chain() {
        let dir = tempdir().unwrap();
        let chain = chain(dir.path(), 1);
        chain.append("hash-X").await.unwrap();

        // Same instants, different text.
        let contents = fs::read_to_string(chain.path()).unwrap();
        fs::write(chain.path(), contents.replace("Z\"", "+00:00\"")).unwrap();
        for block in chain.tail(2).unwrap() {
            assert!(block.verify_hash());
        }

        assert_eq!(chain.verify().unwrap(), ChainVerification::broken(0));
    }

    #[tokio::test]
    async fn test_raising_difficulty_invalidates_old_blocks() {
        let dir = tempdir().unwrap();
        let chain = chain(dir.path(), 1);

        // Mine until a block lands with exactly one leading zero.
        loop {
            let block = chain.append("payload").await.unwrap();
            if !block.hash.starts_with("00") {
                break;
            }
        }
        assert!(chain.verify().unwrap().valid);

        chain.set_difficulty(2);
        assert!(!chain.verify().unwrap().valid);
    }

    #[tokio::test]
    async fn test_mining_timeout_leaves_chain_untouched() {
        let dir = tempdir().unwrap();
        let limits = MiningLimits {
            max_attempts: 5,
            max_duration: std::time::Duration::from_secs(5),
        };
        let chain = ProofOfWorkChain::new(dir.path().join("blocks.jsonl"), 64, limits);

        let result = chain.append("hash-X").await;
        assert!(matches!(result, Err(LedgerError::MiningTimeout { attempts: 5, .. })));
        assert_eq!(chain.len().unwrap(), 1);
    }
}
