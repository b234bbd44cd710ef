//! Proof-of-work blocks

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::ledger::canonical;
use crate::ledger::GENESIS_SENTINEL;

/// `data` of the materialized genesis block.
pub const GENESIS_DATA: &str = "GENESIS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub data: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Hash preimage: `index|timestamp|prev_hash|data|nonce`.
    pub fn preimage(
        index: u64,
        timestamp: &DateTime<Utc>,
        prev_hash: &str,
        data: &str,
        nonce: u64,
    ) -> String {
        Self::stored_preimage(
            index,
            &timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            prev_hash,
            data,
            nonce,
        )
    }

    /// Preimage over the timestamp text exactly as it was written.
    pub fn stored_preimage(
        index: u64,
        timestamp: &str,
        prev_hash: &str,
        data: &str,
        nonce: u64,
    ) -> String {
        format!("{}|{}|{}|{}|{}", index, timestamp, prev_hash, data, nonce)
    }

    pub fn calculate_hash(&self) -> String {
        let preimage = Self::preimage(
            self.index,
            &self.timestamp,
            &self.prev_hash,
            &self.data,
            self.nonce,
        );
        canonical::hash(preimage.as_bytes())
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// The one-time, unmined first block.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: Utc::now(),
            prev_hash: GENESIS_SENTINEL.to_string(),
            data: GENESIS_DATA.to_string(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }
}

// Written in the same form the preimage hashes.
fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Count of leading `'0'` hex characters.
pub fn leading_zeros(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zeros(hash) >= difficulty as usize
}
