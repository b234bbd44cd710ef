//! Anchor cross-references
//!
//! Every successful anchor is recorded in a side log linking the ledger
//! record hash to where it was anchored. The side log is append-only but not
//! hash-chained: it is an index, and the chains it points into carry the
//! tamper evidence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::ledger::storage::JsonlStore;

/// Which ledger produced the anchored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSource {
    Evidence,
    Event,
    Manual,
}

/// Where a hash was anchored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnchorInfo {
    Local {
        height: u64,
        chain_hash: String,
    },
    External {
        transaction_id: String,
        sender: String,
        recipient: String,
        payload_hex: String,
        network_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEntry {
    pub source: AnchorSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<u64>,
    pub record_hash: String,
    pub anchor: AnchorInfo,
}

#[derive(Clone)]
pub struct AnchorsLog {
    store: JsonlStore,
    writer: Arc<Mutex<()>>,
}

impl AnchorsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonlStore::new(path),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub async fn append(&self, entry: &AnchorEntry) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.store.append_line(&serde_json::to_string(entry)?)?;
        debug!("Recorded anchor for {}", entry.record_hash);
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<AnchorEntry>> {
        self.store.scan()
    }

    /// First cross-reference recorded for `record_hash`.
    pub fn find_by_record_hash(&self, record_hash: &str) -> Result<Option<AnchorEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.record_hash == record_hash))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn local_entry(record_hash: &str, height: u64) -> AnchorEntry {
        AnchorEntry {
            source: AnchorSource::Event,
            ledger_index: Some(height - 1),
            record_hash: record_hash.to_string(),
            anchor: AnchorInfo::Local {
                height,
                chain_hash: "0".repeat(64),
            },
        }
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(local_entry("rh", 1)).unwrap();
        assert_eq!(
            value,
            json!({
                "source": "event",
                "ledger_index": 0,
                "record_hash": "rh",
                "anchor": {"mode": "local", "height": 1, "chain_hash": "0".repeat(64)}
            })
        );

        let manual = AnchorEntry {
            source: AnchorSource::Manual,
            ledger_index: None,
            record_hash: "text".to_string(),
            anchor: AnchorInfo::External {
                transaction_id: "0xabc".to_string(),
                sender: "0x01".to_string(),
                recipient: "0x01".to_string(),
                payload_hex: "0x74657874".to_string(),
                network_id: 11155111,
            },
        };
        let value = serde_json::to_value(&manual).unwrap();
        assert!(value.get("ledger_index").is_none());
        assert_eq!(value["anchor"]["mode"], "external");
    }

    #[tokio::test]
    async fn test_append_and_find() {
        let dir = tempdir().unwrap();
        let log = AnchorsLog::new(dir.path().join("anchors.jsonl"));
        assert!(log.is_empty().unwrap());

        log.append(&local_entry("first", 1)).await.unwrap();
        log.append(&local_entry("second", 2)).await.unwrap();

        assert_eq!(log.len().unwrap(), 2);
        let found = log.find_by_record_hash("second").unwrap().unwrap();
        assert_eq!(found.ledger_index, Some(1));
        assert!(log.find_by_record_hash("third").unwrap().is_none());
    }
}
