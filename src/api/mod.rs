//! HTTP surface over the ledgers and the anchoring gateway.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::LedgerError;
use crate::integration::LedgerServices;
use crate::ledger::EventDocument;

pub const MAX_LIMIT: usize = 500;
const DEFAULT_CHAIN_LIMIT: usize = 50;
const DEFAULT_EVENTS_LIMIT: usize = 25;

type ApiResponse = (StatusCode, Json<Value>);

pub fn router(services: LedgerServices) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/blockchain/status", get(blockchain_status))
        .route("/blockchain/chain", get(blockchain_chain))
        .route("/blockchain/verify", get(blockchain_verify))
        .route("/blockchain/anchor", post(blockchain_anchor))
        .route("/blockchain/anchor/:record_hash", get(blockchain_find_anchor))
        .route("/events/ledger", get(events_tail).post(events_persisted))
        .route("/events/ledger/verify", get(events_verify))
        .route("/evidence/ledger", post(evidence_record))
        .route("/evidence/ledger/verify", get(evidence_verify))
        .with_state(services)
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: usize) -> Result<usize, ApiResponse> {
        match self.limit {
            None => Ok(default),
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(bad_request(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EvidenceRequest {
    pub evidence_id: String,
    pub sha256: String,
}

fn bad_request(message: String) -> ApiResponse {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn error_response(err: LedgerError) -> ApiResponse {
    match err {
        LedgerError::InvalidPayload(message) => bad_request(message),
        other => {
            error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() })),
            )
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResponse {
    match serde_json::to_value(value) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(e) => error_response(LedgerError::from(e)),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "guardian-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

async fn blockchain_status(State(services): State<LedgerServices>) -> ApiResponse {
    match services.gateway.status() {
        Ok(status) => to_json(&status),
        Err(e) => error_response(e),
    }
}

async fn blockchain_chain(
    State(services): State<LedgerServices>,
    Query(query): Query<LimitQuery>,
) -> ApiResponse {
    let limit = match query.resolve(DEFAULT_CHAIN_LIMIT) {
        Ok(limit) => limit,
        Err(response) => return response,
    };
    match services.gateway.chain_tail(limit) {
        Ok(blocks) => to_json(&blocks),
        Err(e) => error_response(e),
    }
}

async fn blockchain_verify(State(services): State<LedgerServices>) -> ApiResponse {
    match services.gateway.verify_chain() {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "ok": result.valid, "height": result.count })),
        ),
        Err(e) => error_response(e),
    }
}

async fn blockchain_find_anchor(
    State(services): State<LedgerServices>,
    Path(record_hash): Path<String>,
) -> ApiResponse {
    match services.gateway.find_anchor(&record_hash) {
        Ok(lookup) => to_json(&lookup),
        Err(e) => error_response(e),
    }
}

/// Manually anchor `{"record_hash": ..}` or `{"text": ..}`.
async fn blockchain_anchor(
    State(services): State<LedgerServices>,
    Json(payload): Json<Value>,
) -> ApiResponse {
    let text = ["record_hash", "text"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(|v| v.as_str()))
        .find(|value| !value.is_empty());

    let Some(text) = text else {
        return bad_request("missing text or record_hash".to_string());
    };

    info!("Manual anchor requested for {}", text);
    let outcome = services.gateway.maybe_anchor(text).await;
    to_json(&outcome)
}

async fn events_tail(
    State(services): State<LedgerServices>,
    Query(query): Query<LimitQuery>,
) -> ApiResponse {
    let limit = match query.resolve(DEFAULT_EVENTS_LIMIT) {
        Ok(limit) => limit,
        Err(response) => return response,
    };
    match services.events.ledger().tail(limit) {
        Ok(records) => to_json(&records),
        Err(e) => error_response(e),
    }
}

async fn events_verify(State(services): State<LedgerServices>) -> ApiResponse {
    match services.events.ledger().verify() {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "ok": result.valid, "length": result.count })),
        ),
        Err(e) => error_response(e),
    }
}

/// Event-persisted callback from the event store. Ledgering happens in the
/// background.
async fn events_persisted(
    State(services): State<LedgerServices>,
    Json(event): Json<EventDocument>,
) -> ApiResponse {
    let event_id = event.event_id.clone();
    if event_id.trim().is_empty() {
        warn!("Rejected event without id");
        return bad_request("event_id is required".to_string());
    }

    services.events.on_event_persisted(event);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "event_id": event_id })),
    )
}

async fn evidence_verify(State(services): State<LedgerServices>) -> ApiResponse {
    match services.evidence.ledger().verify() {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "ok": result.valid, "length": result.count })),
        ),
        Err(e) => error_response(e),
    }
}

async fn evidence_record(
    State(services): State<LedgerServices>,
    Json(request): Json<EvidenceRequest>,
) -> ApiResponse {
    match services
        .evidence
        .record_digest(&request.evidence_id, &request.sha256)
        .await
    {
        Ok((receipt, _anchoring)) => to_json(&receipt),
        Err(e) => error_response(e),
    }
}
