//! Proof-of-work chain behaviour over real files.

mod common;

use guardian_ledger::error::LedgerError;
use guardian_ledger::localchain::{Block, MiningLimits, ProofOfWorkChain, GENESIS_DATA};
use guardian_ledger::ledger::GENESIS_SENTINEL;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

use common::{read_lines, tamper_line};

fn chain(dir: &std::path::Path, difficulty: u32) -> ProofOfWorkChain {
    ProofOfWorkChain::new(dir.join("blocks.jsonl"), difficulty, MiningLimits::default())
}

#[tokio::test]
async fn test_first_anchor_lands_at_height_one() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);

    let block = chain.append("hash-X").await.unwrap();
    assert_eq!(block.index, 1);
    assert!(block.hash.starts_with('0'));
    assert!(block.verify_hash());

    let genesis = chain.tail(10).unwrap().remove(0);
    assert_eq!(genesis.data, GENESIS_DATA);
    assert_eq!(genesis.prev_hash, GENESIS_SENTINEL);
    assert_eq!(block.prev_hash, genesis.hash);

    assert_eq!(chain.find_by_data("hash-X").unwrap().unwrap().index, 1);
    assert!(chain.find_by_data("hash-Y").unwrap().is_none());

    let result = chain.verify().unwrap();
    assert!(result.valid);
    assert_eq!(result.count, 2);
}

#[tokio::test]
async fn test_genesis_is_idempotent() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);

    let first = chain.ensure_genesis().await.unwrap();
    let second = chain.ensure_genesis().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(chain.len().unwrap(), 1);
}

#[tokio::test]
async fn test_rehashed_tamper_without_work_is_rejected() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);
    chain.append("hash-X").await.unwrap();
    chain.append("hash-Z").await.unwrap();

    tamper_line(chain.path(), 1, |value| {
        let mut block: Block = serde_json::from_value(value.clone()).unwrap();
        block.data = "hash-forged".to_string();
        block.nonce = 0;
        block.hash = block.calculate_hash();
        while block.meets_difficulty(1) {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }
        *value = serde_json::to_value(&block).unwrap();
    });

    let result = chain.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 1);
}

#[tokio::test]
async fn test_raising_difficulty_invalidates_existing_blocks() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);
    chain.append("hash-X").await.unwrap();
    assert!(chain.verify().unwrap().valid);

    chain.set_difficulty(64);
    let result = chain.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 1);
}

#[tokio::test]
async fn test_unreadable_genesis_is_repaired_in_place() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);
    let later = r#"{"index":1,"kept":"verbatim"}"#;
    fs::write(chain.path(), format!("garbage\n{}\n", later)).unwrap();

    let genesis = chain.ensure_genesis().await.unwrap();
    assert!(genesis.is_genesis());

    let lines = read_lines(chain.path());
    assert_eq!(lines.len(), 2);
    let stored: Block = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(stored, genesis);
    assert_eq!(lines[1], later);
}

#[tokio::test]
async fn test_genesis_repair_leaves_later_bytes_alone() {
    let dir = tempdir().unwrap();
    let chain = chain(dir.path(), 1);
    let later: &[u8] = b"{\"index\":1,\"data\":\"\xff\xfe\"}\r\n{\"index\":2}\r\n";
    let mut original = b"{not a block\r\n".to_vec();
    original.extend_from_slice(later);
    fs::write(chain.path(), &original).unwrap();

    let genesis = chain.ensure_genesis().await.unwrap();

    let mut expected = serde_json::to_vec(&genesis).unwrap();
    expected.push(b'\n');
    expected.extend_from_slice(later);
    assert_eq!(fs::read(chain.path()).unwrap(), expected);
}

#[tokio::test]
async fn test_mining_gives_up_at_attempt_bound() {
    let dir = tempdir().unwrap();
    let chain = ProofOfWorkChain::new(
        dir.path().join("blocks.jsonl"),
        64,
        MiningLimits {
            max_attempts: 10,
            max_duration: Duration::from_secs(5),
        },
    );

    match chain.append("hash-X").await {
        Err(LedgerError::MiningTimeout { attempts, .. }) => assert!(attempts <= 10),
        other => panic!("expected mining timeout, got {:?}", other),
    }
    // Genesis is written, nothing else.
    assert_eq!(chain.len().unwrap(), 1);
}
