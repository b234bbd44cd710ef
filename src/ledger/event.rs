//! Event documents as handed over by the event store.
//!
//! Only the stable fields that feed into the fingerprint are modelled. The
//! timestamp and beneficiary ids are accepted in the representations the
//! upstream store produces and normalized on the way in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    #[serde(alias = "_id")]
    pub event_id: String,
    pub donor_id: String,
    pub ngo_id: String,
    pub quantity: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub gps: Gps,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub ip: String,
    #[serde(default, deserialize_with = "deserialize_ids")]
    pub beneficiary_ids: Vec<String>,
}

fn default_unit() -> String {
    "meals".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Seconds(i64),
    FractionalSeconds(f64),
    Extended {
        #[serde(rename = "$date")]
        date: Box<RawTimestamp>,
    },
}

/// Parse the textual timestamp forms seen upstream: RFC 3339 with any offset,
/// naive date-times (taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(format!("unrecognized timestamp '{}'", raw))
}

fn resolve(raw: RawTimestamp) -> Result<DateTime<Utc>, String> {
    match raw {
        RawTimestamp::Text(text) => parse_timestamp(&text),
        RawTimestamp::Seconds(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| format!("timestamp {} out of range", secs)),
        RawTimestamp::FractionalSeconds(secs) => {
            let millis = (secs * 1000.0).round() as i64;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| format!("timestamp {} out of range", secs))
        }
        RawTimestamp::Extended { date } => resolve(*date),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawTimestamp::deserialize(deserializer)?;
    resolve(raw).map_err(serde::de::Error::custom)
}

fn deserialize_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|id| match id {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(timestamp: Value) -> Value {
        json!({
            "_id": "65f0c1",
            "donor_id": "donor-1",
            "ngo_id": "ngo-1",
            "quantity": 40,
            "gps": {"lat": 12.97, "lon": 77.59},
            "timestamp": timestamp,
            "device_id": "dev-9",
            "ip": "10.0.0.8",
            "beneficiary_ids": ["b2", 17, "b1"]
        })
    }

    #[test]
    fn test_accepts_mongo_style_id_and_defaults() {
        let event: EventDocument = serde_json::from_value(doc(json!("2024-01-01T00:00:00Z"))).unwrap();
        assert_eq!(event.event_id, "65f0c1");
        assert_eq!(event.unit, "meals");
        assert_eq!(event.beneficiary_ids, vec!["b2", "17", "b1"]);
    }

    #[test]
    fn test_timestamp_representations_agree() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let forms = [
            json!("2024-01-01T00:00:00Z"),
            json!("2024-01-01T05:30:00+05:30"),
            json!("2024-01-01T00:00:00"),
            json!("2024-01-01 00:00:00.000"),
            json!("2024-01-01"),
            json!(1704067200),
            json!({"$date": "2024-01-01T00:00:00.000Z"}),
        ];
        for form in forms {
            let event: EventDocument = serde_json::from_value(doc(form.clone())).unwrap();
            assert_eq!(event.timestamp, expected, "form {}", form);
        }
    }

    #[test]
    fn test_rejects_garbage_timestamp() {
        assert!(serde_json::from_value::<EventDocument>(doc(json!("yesterday"))).is_err());
    }
}
