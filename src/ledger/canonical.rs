//! Canonical serialization and hashing
//!
//! Every ledger hash goes through this module. Canonical form is compact JSON
//! with object keys sorted at every depth, so the same logical content always
//! produces the same bytes regardless of field or map insertion order.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::ledger::event::EventDocument;

/// Name of the self-hash field excluded from a record's own hash.
pub const RECORD_HASH_FIELD: &str = "record_hash";

/// Canonical bytes of any serializable value.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize_value(&value).into_bytes())
}

/// Canonical text of an already parsed JSON value.
pub fn canonicalize_value(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lowercase hex SHA-256.
pub fn hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash of a stored record with its own `record_hash` field left out.
pub fn record_hash(record: &Value) -> String {
    match record {
        Value::Object(map) if map.contains_key(RECORD_HASH_FIELD) => {
            let mut without = map.clone();
            without.remove(RECORD_HASH_FIELD);
            hash(canonicalize_value(&Value::Object(without)).as_bytes())
        }
        other => hash(canonicalize_value(other).as_bytes()),
    }
}

/// Content hash of uploaded evidence bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hash(bytes)
}

/// The order- and representation-independent projection of an event.
pub fn event_projection(event: &EventDocument) -> Value {
    let mut beneficiaries = event.beneficiary_ids.clone();
    beneficiaries.sort();

    json!({
        "event_id": event.event_id,
        "donor_id": event.donor_id,
        "ngo_id": event.ngo_id,
        "quantity": event.quantity,
        "unit": event.unit,
        "gps": {"lat": event.gps.lat, "lon": event.gps.lon},
        "timestamp": iso_utc(&event.timestamp),
        "device_id": event.device_id,
        "ip": event.ip,
        "beneficiary_ids": beneficiaries,
    })
}

/// UTC instant as `YYYY-MM-DDTHH:MM:SS[.ffffff]+00:00`: microsecond precision,
/// fraction only when non-zero. Existing events-ledger fingerprints use this form.
pub fn iso_utc(ts: &DateTime<Utc>) -> String {
    let micros = ts.nanosecond() % 1_000_000_000 / 1_000;
    if micros == 0 {
        format!("{}+00:00", ts.format("%Y-%m-%dT%H:%M:%S"))
    } else {
        format!("{}.{:06}+00:00", ts.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}

/// Deterministic fingerprint of an event.
pub fn fingerprint(event: &EventDocument) -> String {
    hash(canonicalize_value(&event_projection(event)).as_bytes())
}
