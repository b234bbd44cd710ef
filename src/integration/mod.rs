//! Ledger integrations
//!
//! Hooks called after the business store has persisted an event or an
//! evidence file, and the bundle of handles the server shares between them.

pub mod events;
pub mod evidence;

pub use events::{EventLedgerIntegration, RecordedEvent};
pub use evidence::{EvidenceLedgerIntegration, EvidenceReceipt};

use tracing::info;

use crate::anchor::AnchoringGateway;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ledger::{EventsLedger, EvidenceLedger};

/// Every ledger handle, constructed once at startup.
#[derive(Clone)]
pub struct LedgerServices {
    pub evidence: EvidenceLedgerIntegration,
    pub events: EventLedgerIntegration,
    pub gateway: AnchoringGateway,
}

impl LedgerServices {
    pub fn new(evidence: EvidenceLedger, events: EventsLedger, gateway: AnchoringGateway) -> Self {
        Self {
            evidence: EvidenceLedgerIntegration::new(evidence, gateway.clone()),
            events: EventLedgerIntegration::new(events, gateway.clone()),
            gateway,
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let evidence = EvidenceLedger::new(config.evidence_ledger_path());
        evidence.ensure_initialized()?;
        let events = EventsLedger::new(config.events_ledger_path());
        events.ensure_initialized()?;
        let gateway = AnchoringGateway::from_config(config).await?;

        info!("Ledgers opened in {}", config.ledger_dir.display());
        Ok(Self::new(evidence, events, gateway))
    }
}
