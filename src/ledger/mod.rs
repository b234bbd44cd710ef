//! Tamper-Evident Ledgers
//!
//! Append-only JSONL logs whose records are linked by SHA-256 hashes, plus
//! the canonical serialization every hash is computed over.

pub mod canonical;
pub mod chain_log;
pub mod event;
pub mod record;
pub mod storage;

pub use chain_log::{ChainVerification, HashChainLog};
pub use event::{EventDocument, Gps};
pub use record::{
    ChainRecord, EventLedgerPayload, EventLedgerRecord, EvidencePayload, EvidenceRecord,
    LedgerPayload, GENESIS_SENTINEL,
};

pub type EvidenceLedger = HashChainLog<EvidencePayload>;
pub type EventsLedger = HashChainLog<EventLedgerPayload>;
