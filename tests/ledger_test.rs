//! Hash-chained ledger behaviour over real files.

mod common;

use guardian_ledger::ledger::canonical;
use guardian_ledger::ledger::{EvidenceLedger, EvidencePayload, EventsLedger, GENESIS_SENTINEL};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

use common::{digest, read_lines, sample_event, tamper_line};

fn payload(n: usize) -> EvidencePayload {
    EvidencePayload {
        evidence_id: format!("evidence-{}", n),
        sha256: format!("{:064x}", n),
    }
}

async fn filled_ledger(dir: &std::path::Path, n: usize) -> EvidenceLedger {
    let ledger = EvidenceLedger::new(dir.join("chain.jsonl"));
    for i in 0..n {
        ledger.append(payload(i)).await.unwrap();
    }
    ledger
}

#[tokio::test]
async fn test_untouched_ledger_verifies() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 5).await;

    let result = ledger.verify().unwrap();
    assert!(result.valid);
    assert_eq!(result.count, 5);
}

#[tokio::test]
async fn test_missing_ledger_is_empty_and_valid() {
    let dir = tempdir().unwrap();
    let ledger = EvidenceLedger::new(dir.path().join("nothing").join("chain.jsonl"));

    let result = ledger.verify().unwrap();
    assert!(result.valid);
    assert_eq!(result.count, 0);
    assert!(ledger.tail(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_payload_tamper_breaks_at_that_record() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 5).await;

    tamper_line(ledger.path(), 2, |value| {
        value["sha256"] = json!("f".repeat(64));
    });

    let result = ledger.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 2);
}

#[tokio::test]
async fn test_record_hash_tamper_breaks_at_that_record() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 4).await;

    tamper_line(ledger.path(), 3, |value| {
        value["record_hash"] = json!("0".repeat(64));
    });

    let result = ledger.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 3);
}

#[tokio::test]
async fn test_added_field_breaks_hash() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 3).await;

    tamper_line(ledger.path(), 0, |value| {
        value["note"] = json!("inserted later");
    });

    let result = ledger.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 0);
}

#[tokio::test]
async fn test_evidence_digests_chain_from_genesis() {
    let dir = tempdir().unwrap();
    let ledger = EvidenceLedger::new(dir.path().join("chain.jsonl"));

    let mut records = Vec::new();
    for suffix in ['1', '2', '3'] {
        let record = ledger
            .append(EvidencePayload {
                evidence_id: format!("photo-{}", suffix),
                sha256: digest(suffix),
            })
            .await
            .unwrap();
        records.push(record);
    }

    let indices: Vec<u64> = records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(records[0].prev_hash, GENESIS_SENTINEL);
    assert_eq!(records[1].prev_hash, records[0].record_hash);
    assert_eq!(records[2].prev_hash, records[1].record_hash);
    assert!(records.iter().all(|r| r.verify_hash()));

    let result = ledger.verify().unwrap();
    assert!(result.valid);
    assert_eq!(result.count, 3);
}

#[tokio::test]
async fn test_malformed_line_is_skipped_on_reads_but_breaks_verify() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 2).await;

    {
        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        writeln!(file, "{{not json").unwrap();
    }
    ledger.append(payload(2)).await.unwrap();

    // Appends chain off the last well-formed record.
    let lines = read_lines(ledger.path());
    assert_eq!(lines.len(), 4);
    let tail = ledger.tail(10).unwrap();
    assert_eq!(tail.len(), 3);
    assert_eq!(tail[2].index, 2);
    assert_eq!(tail[2].prev_hash, tail[1].record_hash);

    let result = ledger.verify().unwrap();
    assert!(!result.valid);
    assert_eq!(result.count, 2);
}

#[tokio::test]
async fn test_tail_counts_only_well_formed_records() {
    let dir = tempdir().unwrap();
    let ledger = filled_ledger(dir.path(), 2).await;
    {
        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        writeln!(file, "garbage").unwrap();
    }
    ledger.append(payload(2)).await.unwrap();

    let tail = ledger.tail(2).unwrap();
    let indices: Vec<u64> = tail.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(tail[0].payload, payload(1));
    assert_eq!(tail[1].payload, payload(2));
}

#[tokio::test]
async fn test_concurrent_appends_stay_linked() {
    let dir = tempdir().unwrap();
    let ledger = EvidenceLedger::new(dir.path().join("chain.jsonl"));

    let mut handles = Vec::new();
    for i in 0..16 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move { ledger.append(payload(i)).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let result = ledger.verify().unwrap();
    assert!(result.valid);
    assert_eq!(result.count, 16);
}

#[tokio::test]
async fn test_events_ledger_find_by_payload() {
    let dir = tempdir().unwrap();
    let ledger = EventsLedger::new(dir.path().join("events_chain.jsonl"));
    let event = sample_event("evt-100");

    let payload = guardian_ledger::ledger::EventLedgerPayload {
        event_id: event.event_id.clone(),
        fingerprint: canonical::fingerprint(&event),
    };
    let record = ledger.append(payload.clone()).await.unwrap();

    let found = ledger.find_by_payload(&payload).unwrap().unwrap();
    assert_eq!(found.record_hash, record.record_hash);
}

#[test]
fn test_fingerprint_ignores_beneficiary_order() {
    let event = sample_event("evt-1");
    let mut reordered = event.clone();
    reordered.beneficiary_ids.reverse();
    assert_eq!(canonical::fingerprint(&event), canonical::fingerprint(&reordered));

    let mut changed = event.clone();
    changed.quantity += 1;
    assert_ne!(canonical::fingerprint(&event), canonical::fingerprint(&changed));
}
