//! Evidence Ledger Integration
//!
//! Called once an uploaded evidence file has been stored. The digest is
//! committed to the evidence ledger synchronously; anchoring runs in the
//! background.

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::anchor::{AnchorOutcome, AnchorSource, AnchoringGateway};
use crate::error::{LedgerError, Result};
use crate::ledger::canonical;
use crate::ledger::{EvidenceLedger, EvidencePayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceReceipt {
    pub evidence_id: String,
    pub sha256: String,
    pub ledger_index: u64,
    pub record_hash: String,
}

#[derive(Clone)]
pub struct EvidenceLedgerIntegration {
    ledger: EvidenceLedger,
    gateway: AnchoringGateway,
}

impl EvidenceLedgerIntegration {
    pub fn new(ledger: EvidenceLedger, gateway: AnchoringGateway) -> Self {
        Self { ledger, gateway }
    }

    pub fn ledger(&self) -> &EvidenceLedger {
        &self.ledger
    }

    pub async fn record_upload(
        &self,
        evidence_id: &str,
        bytes: &[u8],
    ) -> Result<(EvidenceReceipt, JoinHandle<AnchorOutcome>)> {
        let sha256 = canonical::content_hash(bytes);
        self.record_digest(evidence_id, &sha256).await
    }

    /// Append `{evidence_id, sha256}` and start anchoring the new record.
    /// The returned handle resolves to the anchor outcome; dropping it does
    /// not cancel the anchoring.
    pub async fn record_digest(
        &self,
        evidence_id: &str,
        sha256: &str,
    ) -> Result<(EvidenceReceipt, JoinHandle<AnchorOutcome>)> {
        let evidence_id = evidence_id.trim();
        if evidence_id.is_empty() {
            return Err(LedgerError::InvalidPayload("evidence_id is required".to_string()));
        }
        let sha256 = normalize_digest(sha256)?;

        let record = self
            .ledger
            .append(EvidencePayload {
                evidence_id: evidence_id.to_string(),
                sha256: sha256.clone(),
            })
            .await?;

        let receipt = EvidenceReceipt {
            evidence_id: evidence_id.to_string(),
            sha256,
            ledger_index: record.index,
            record_hash: record.record_hash.clone(),
        };

        let gateway = self.gateway.clone();
        let handle = tokio::spawn(async move {
            let outcome = gateway
                .anchor_ledger_record(AnchorSource::Evidence, Some(record.index), &record.record_hash)
                .await;
            match &outcome {
                AnchorOutcome::Anchored(_) => debug!("Evidence record {} anchored", record.index),
                AnchorOutcome::Skipped { reason } => {
                    debug!("Evidence record {} not anchored: {:?}", record.index, reason)
                }
            }
            outcome
        });

        Ok((receipt, handle))
    }
}

/// Accept a SHA-256 hex digest in any case and return it lowercased.
pub fn normalize_digest(raw: &str) -> Result<String> {
    let digest = raw.trim();
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        warn!("Rejected evidence digest '{}'", digest);
        return Err(LedgerError::InvalidPayload(
            "sha256 must be 64 hex characters".to_string(),
        ));
    }
    Ok(digest.to_ascii_lowercase())
}
