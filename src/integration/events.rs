//! Event Ledger Integration
//!
//! Called after the business store has persisted an event. The event is
//! fingerprinted, appended to the events ledger, and the new record hash is
//! handed to the anchoring gateway.

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::anchor::{AnchorOutcome, AnchorSource, AnchoringGateway};
use crate::error::Result;
use crate::ledger::canonical;
use crate::ledger::{EventDocument, EventLedgerPayload, EventLedgerRecord, EventsLedger};

#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub record: EventLedgerRecord,
    pub anchor: AnchorOutcome,
}

#[derive(Clone)]
pub struct EventLedgerIntegration {
    ledger: EventsLedger,
    gateway: AnchoringGateway,
}

impl EventLedgerIntegration {
    pub fn new(ledger: EventsLedger, gateway: AnchoringGateway) -> Self {
        Self { ledger, gateway }
    }

    pub fn ledger(&self) -> &EventsLedger {
        &self.ledger
    }

    /// Append the event's fingerprint and anchor the resulting record.
    /// Only the ledger append can fail; anchoring problems come back in
    /// `RecordedEvent::anchor`.
    pub async fn record_event(&self, event: &EventDocument) -> Result<RecordedEvent> {
        let payload = EventLedgerPayload {
            event_id: event.event_id.clone(),
            fingerprint: canonical::fingerprint(event),
        };
        let record = self.ledger.append(payload).await?;

        let anchor = self
            .gateway
            .anchor_ledger_record(AnchorSource::Event, Some(record.index), &record.record_hash)
            .await;
        if anchor.is_anchored() {
            info!("Event {} anchored at ledger index {}", event.event_id, record.index);
        }

        Ok(RecordedEvent { record, anchor })
    }

    /// Fire-and-forget hook for the event store. The caller never waits on
    /// the ledger, and failures are only logged.
    pub fn on_event_persisted(&self, event: EventDocument) -> JoinHandle<()> {
        let integration = self.clone();
        tokio::spawn(async move {
            if let Err(e) = integration.record_event(&event).await {
                error!("Failed to record event {} in ledger: {}", event.event_id, e);
            }
        })
    }
}
