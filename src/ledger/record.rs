//! Ledger records
//!
//! A record is an index, a timestamp, the ledger-specific payload fields, and
//! the two hashes that chain it to its predecessor.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::Result;
use crate::ledger::canonical;

/// `prev_hash` of the first record in a plain ledger.
pub const GENESIS_SENTINEL: &str = "GENESIS";

/// Payload carried by one kind of ledger.
pub trait LedgerPayload:
    Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static
{
    /// Short ledger name used in log lines.
    const LEDGER: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord<P> {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: P,
    pub prev_hash: String,
    pub record_hash: String,
}

impl<P: LedgerPayload> ChainRecord<P> {
    /// Build a record and compute its hash.
    pub fn seal(
        index: u64,
        timestamp: DateTime<Utc>,
        payload: P,
        prev_hash: String,
    ) -> Result<Self> {
        let mut record = Self {
            index,
            timestamp,
            payload,
            prev_hash,
            record_hash: String::new(),
        };
        record.record_hash = record.calculate_hash()?;
        Ok(record)
    }

    pub fn calculate_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(canonical::record_hash(&value))
    }

    pub fn verify_hash(&self) -> bool {
        self.calculate_hash()
            .map(|hash| hash == self.record_hash)
            .unwrap_or(false)
    }

    pub fn is_first(&self) -> bool {
        self.index == 0 && self.prev_hash == GENESIS_SENTINEL
    }
}

/// Evidence ledger payload: which file, and the SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePayload {
    pub evidence_id: String,
    pub sha256: String,
}

impl LedgerPayload for EvidencePayload {
    const LEDGER: &'static str = "evidence";
}

/// Events ledger payload: which event, and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLedgerPayload {
    pub event_id: String,
    pub fingerprint: String,
}

impl LedgerPayload for EventLedgerPayload {
    const LEDGER: &'static str = "events";
}

pub type EvidenceRecord = ChainRecord<EvidencePayload>;
pub type EventLedgerRecord = ChainRecord<EventLedgerPayload>;
