//! Anchoring Gateway
//!
//! Mode-dispatched facade over the local proof-of-work chain and the
//! external chain client. Anchoring never fails its caller: by the time a
//! hash reaches the gateway the ledger record behind it is already durable,
//! so every failure comes back as a `Skipped` outcome.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::anchor::entry::{AnchorEntry, AnchorInfo, AnchorSource, AnchorsLog};
use crate::anchor::external::{ExternalChainClient, JsonRpcChainClient};
use crate::config::{AnchorMode, AppConfig};
use crate::error::{LedgerError, Result};
use crate::ledger::ChainVerification;
use crate::localchain::{Block, ProofOfWorkChain};

/// Why no anchor was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NotConfigured(String),
    Unavailable(String),
    MiningTimeout(String),
}

impl From<LedgerError> for SkipReason {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AnchorNotConfigured(msg) => SkipReason::NotConfigured(msg),
            err @ LedgerError::MiningTimeout { .. } => SkipReason::MiningTimeout(err.to_string()),
            other => SkipReason::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorOutcome {
    Anchored(AnchorEntry),
    Skipped { reason: SkipReason },
}

impl AnchorOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        AnchorOutcome::Skipped { reason }
    }

    pub fn is_anchored(&self) -> bool {
        matches!(self, AnchorOutcome::Anchored(_))
    }

    pub fn info(&self) -> Option<&AnchorInfo> {
        match self {
            AnchorOutcome::Anchored(entry) => Some(&entry.anchor),
            AnchorOutcome::Skipped { .. } => None,
        }
    }
}

/// Gateway summary for status endpoints. Fields not relevant to the mode are
/// left out of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorStatus {
    pub mode: AnchorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AnchorStatus {
    fn bare(mode: AnchorMode) -> Self {
        Self {
            mode,
            valid: None,
            height: None,
            length: None,
            tip_hash: None,
            configured: None,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorLookup {
    Found {
        block: Block,
        #[serde(skip_serializing_if = "Option::is_none")]
        entry: Option<AnchorEntry>,
    },
    NotFound,
    Unsupported { mode: AnchorMode },
}

#[derive(Clone)]
pub struct AnchoringGateway {
    mode: AnchorMode,
    local: Option<ProofOfWorkChain>,
    external: Option<Arc<dyn ExternalChainClient>>,
    anchors: AnchorsLog,
}

impl AnchoringGateway {
    pub fn new(
        mode: AnchorMode,
        local: Option<ProofOfWorkChain>,
        external: Option<Arc<dyn ExternalChainClient>>,
        anchors: AnchorsLog,
    ) -> Self {
        Self {
            mode,
            local,
            external,
            anchors,
        }
    }

    /// Build the gateway for the configured mode. The local chain handle is
    /// always opened for read-only inspection; its genesis is only written in
    /// local mode. A broken external configuration leaves the gateway in
    /// external mode with every anchor skipped.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let anchors = AnchorsLog::new(config.anchors_path());
        let local = ProofOfWorkChain::from_config(config.blocks_path(), &config.pow);

        if config.blockchain_mode == AnchorMode::Local {
            local.ensure_genesis().await?;
        }

        let external: Option<Arc<dyn ExternalChainClient>> =
            if config.blockchain_mode == AnchorMode::External {
                match JsonRpcChainClient::new(config.external.clone()) {
                    Ok(client) => {
                        if !client.is_configured() {
                            warn!("External anchoring selected but not fully configured");
                        }
                        Some(Arc::new(client) as Arc<dyn ExternalChainClient>)
                    }
                    Err(e) => {
                        warn!("External anchoring disabled: {}", e);
                        None
                    }
                }
            } else {
                None
            };

        info!("Anchoring gateway ready in {} mode", config.blockchain_mode);
        Ok(Self::new(config.blockchain_mode, Some(local), external, anchors))
    }

    pub fn mode(&self) -> AnchorMode {
        self.mode
    }

    pub fn anchors(&self) -> &AnchorsLog {
        &self.anchors
    }

    pub fn local_chain(&self) -> Option<&ProofOfWorkChain> {
        self.local.as_ref()
    }

    /// Anchor an arbitrary string.
    pub async fn maybe_anchor(&self, record_hash: &str) -> AnchorOutcome {
        self.anchor_ledger_record(AnchorSource::Manual, None, record_hash)
            .await
    }

    /// Anchor a ledger record hash and record the cross-reference.
    pub async fn anchor_ledger_record(
        &self,
        source: AnchorSource,
        ledger_index: Option<u64>,
        record_hash: &str,
    ) -> AnchorOutcome {
        let anchor = match self.dispatch(record_hash).await {
            Ok(Some(anchor)) => anchor,
            Ok(None) => return AnchorOutcome::skipped(SkipReason::Disabled),
            Err(e) => {
                warn!("[anchor][{}] skipped for {}: {}", self.mode, record_hash, e);
                return AnchorOutcome::skipped(SkipReason::from(e));
            }
        };

        let entry = AnchorEntry {
            source,
            ledger_index,
            record_hash: record_hash.to_string(),
            anchor,
        };

        // The anchor itself exists at this point; losing the index entry only
        // costs the fast lookup.
        if let Err(e) = self.anchors.append(&entry).await {
            error!("Anchored {} but failed to record it: {}", record_hash, e);
        }

        AnchorOutcome::Anchored(entry)
    }

    async fn dispatch(&self, record_hash: &str) -> Result<Option<AnchorInfo>> {
        match self.mode {
            AnchorMode::Off => Ok(None),
            AnchorMode::Local => {
                let chain = self.local.as_ref().ok_or_else(|| {
                    LedgerError::AnchorNotConfigured("no local chain attached".to_string())
                })?;
                let block = chain.append(record_hash).await?;
                Ok(Some(AnchorInfo::Local {
                    height: block.index,
                    chain_hash: block.hash,
                }))
            }
            AnchorMode::External => {
                let client = self
                    .external
                    .as_ref()
                    .filter(|client| client.is_configured())
                    .ok_or_else(|| {
                        LedgerError::AnchorNotConfigured("external chain settings incomplete".to_string())
                    })?;
                let receipt = client.anchor_text(record_hash).await?;
                Ok(Some(AnchorInfo::External {
                    transaction_id: receipt.transaction_id,
                    sender: receipt.sender,
                    recipient: receipt.recipient,
                    payload_hex: receipt.payload_hex,
                    network_id: receipt.network_id,
                }))
            }
        }
    }

    pub fn status(&self) -> Result<AnchorStatus> {
        let mut status = AnchorStatus::bare(self.mode);
        match self.mode {
            AnchorMode::Off => {
                status.note = Some("anchoring disabled".to_string());
            }
            AnchorMode::Local => {
                // `height` is the verified block count, as on `/blockchain/verify`;
                // `length` counts every well-formed block, verified or not.
                let verification = self.verify_chain()?;
                let (length, tip) = match &self.local {
                    Some(chain) => (chain.len()? as u64, chain.tip()?),
                    None => (0, None),
                };
                status.valid = Some(verification.valid);
                status.height = Some(verification.count);
                status.length = Some(length);
                status.tip_hash = tip.map(|block| block.hash);
            }
            AnchorMode::External => {
                status.configured = Some(
                    self.external
                        .as_ref()
                        .map(|client| client.is_configured())
                        .unwrap_or(false),
                );
            }
        }
        Ok(status)
    }

    /// Look up where `record_hash` was anchored. Only the local chain can be
    /// searched by payload.
    pub fn find_anchor(&self, record_hash: &str) -> Result<AnchorLookup> {
        let chain = match (&self.mode, &self.local) {
            (AnchorMode::Local, Some(chain)) => chain,
            _ => return Ok(AnchorLookup::Unsupported { mode: self.mode }),
        };

        match chain.find_by_data(record_hash)? {
            Some(block) => {
                let entry = self.anchors.find_by_record_hash(record_hash)?;
                Ok(AnchorLookup::Found { block, entry })
            }
            None => Ok(AnchorLookup::NotFound),
        }
    }

    pub fn chain_tail(&self, n: usize) -> Result<Vec<Block>> {
        match &self.local {
            Some(chain) => chain.tail(n),
            None => Ok(Vec::new()),
        }
    }

    pub fn verify_chain(&self) -> Result<ChainVerification> {
        match &self.local {
            Some(chain) => chain.verify(),
            None => Ok(ChainVerification::intact(0)),
        }
    }
}
