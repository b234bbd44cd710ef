//! Hash-chained append-only log
//!
//! Generic over the payload so the evidence and events ledgers share one
//! implementation. Each log owns its writer lock: the read-last-record,
//! compute-next, append sequence runs under it, so appends through one handle
//! (or any of its clones) never race. Reads take no lock.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ledger::canonical::{self, RECORD_HASH_FIELD};
use crate::ledger::record::{ChainRecord, LedgerPayload, GENESIS_SENTINEL};
use crate::ledger::storage::{JsonlStore, StoredLine};

/// Outcome of a full-chain verification.
///
/// `count` is the number of records verified before the first break, or the
/// whole length when `valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub count: u64,
}

impl ChainVerification {
    pub fn intact(count: u64) -> Self {
        Self { valid: true, count }
    }

    pub fn broken(count: u64) -> Self {
        Self { valid: false, count }
    }
}

pub struct HashChainLog<P> {
    store: JsonlStore,
    writer: Arc<Mutex<()>>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> Clone for HashChainLog<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            writer: Arc::clone(&self.writer),
            _payload: PhantomData,
        }
    }
}

impl<P: LedgerPayload> HashChainLog<P> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonlStore::new(path),
            writer: Arc::new(Mutex::new(())),
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Prepare storage. Plain ledgers have no materialized genesis, so this
    /// only makes sure the directory exists.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.store.ensure_parent()
    }

    /// Append a payload as the next record in the chain.
    pub async fn append(&self, payload: P) -> Result<ChainRecord<P>> {
        let _guard = self.writer.lock().await;

        let (index, prev_hash) = match self.store.last::<ChainRecord<P>>()? {
            Some(last) => (last.index + 1, last.record_hash),
            None => (0, GENESIS_SENTINEL.to_string()),
        };

        let record = ChainRecord::seal(index, Utc::now(), payload, prev_hash)?;
        let line = serde_json::to_string(&record)?;
        self.store.append_line(&line)?;

        info!(
            "Appended {} ledger record {} ({})",
            P::LEDGER,
            record.index,
            record.record_hash
        );
        Ok(record)
    }

    /// Walk the chain from the start and stop at the first broken link.
    pub fn verify(&self) -> Result<ChainVerification> {
        let mut prev_hash = GENESIS_SENTINEL.to_string();
        let mut count = 0u64;

        for entry in self.store.entries()? {
            let value = match entry {
                StoredLine::Record { value, .. } => value,
                StoredLine::Corrupt { line, reason } => {
                    warn!("{} ledger corrupt at line {}: {}", P::LEDGER, line, reason);
                    return Ok(ChainVerification::broken(count));
                }
            };

            if let Err(reason) = check_link(&value, count, &prev_hash) {
                warn!("{} ledger broken at record {}: {}", P::LEDGER, count, reason);
                return Ok(ChainVerification::broken(count));
            }
            if serde_json::from_value::<ChainRecord<P>>(value.clone()).is_err() {
                warn!("{} ledger record {} has an unexpected shape", P::LEDGER, count);
                return Ok(ChainVerification::broken(count));
            }

            prev_hash = value[RECORD_HASH_FIELD]
                .as_str()
                .unwrap_or_default()
                .to_string();
            count += 1;
        }

        debug!("{} ledger verified: {} records", P::LEDGER, count);
        Ok(ChainVerification::intact(count))
    }

    /// The last `n` well-formed records, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<ChainRecord<P>>> {
        let mut records = self.store.scan::<ChainRecord<P>>()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    /// First record, oldest first, whose payload equals `payload`.
    pub fn find_by_payload(&self, payload: &P) -> Result<Option<ChainRecord<P>>> {
        Ok(self
            .store
            .scan::<ChainRecord<P>>()?
            .into_iter()
            .find(|record| &record.payload == payload))
    }

    pub fn last(&self) -> Result<Option<ChainRecord<P>>> {
        self.store.last()
    }

    /// Number of well-formed records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.store.scan::<ChainRecord<P>>()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.last()?.is_none())
    }
}

/// Check index continuity, prev-hash linkage and the self-hash of one stored
/// record. The hash is recomputed over the raw stored object, so added or
/// dropped fields break it too.
pub(crate) fn check_link(
    value: &Value,
    expected_index: u64,
    expected_prev: &str,
) -> std::result::Result<(), String> {
    let index = value.get("index").and_then(Value::as_u64);
    if index != Some(expected_index) {
        return Err(format!("expected index {}, found {:?}", expected_index, index));
    }

    let prev = value.get("prev_hash").and_then(Value::as_str);
    if prev != Some(expected_prev) {
        return Err(format!("prev_hash {:?} does not link to {}", prev, expected_prev));
    }

    let stored = value.get(RECORD_HASH_FIELD).and_then(Value::as_str);
    let computed = canonical::record_hash(value);
    if stored != Some(computed.as_str()) {
        return Err(format!("record_hash {:?} does not match {}", stored, computed));
    }

    Ok(())
}
