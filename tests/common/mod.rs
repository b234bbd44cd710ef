#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::fs;
use std::path::Path;

use guardian_ledger::config::{AnchorMode, AppConfig, ExternalChainConfig, PowConfig};
use guardian_ledger::ledger::{EventDocument, Gps};

/// Well-known test key and its address.
pub const TEST_PRIVATE_KEY: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const TEST_ADDRESS: &str = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23";

/// Config rooted at `dir` with difficulty 1 so mining is instant.
pub fn test_config(dir: &Path, mode: AnchorMode) -> AppConfig {
    AppConfig {
        ledger_dir: dir.to_path_buf(),
        blockchain_mode: mode,
        pow: PowConfig {
            difficulty: 1,
            ..PowConfig::default()
        },
        ..AppConfig::default()
    }
}

pub fn external_config(dir: &Path, provider_url: &str) -> AppConfig {
    AppConfig {
        external: ExternalChainConfig {
            provider_url: provider_url.to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            chain_id: 11155111,
            gas_limit: 100_000,
        },
        ..test_config(dir, AnchorMode::External)
    }
}

pub fn sample_event(id: &str) -> EventDocument {
    EventDocument {
        event_id: id.to_string(),
        donor_id: "donor-42".to_string(),
        ngo_id: "ngo-7".to_string(),
        quantity: 120,
        unit: "meals".to_string(),
        gps: Gps {
            lat: 19.076,
            lon: 72.8777,
        },
        timestamp: Utc.with_ymd_and_hms(2024, 5, 12, 18, 45, 0).unwrap(),
        device_id: "tablet-3".to_string(),
        ip: "203.0.113.9".to_string(),
        beneficiary_ids: vec!["ben-3".to_string(), "ben-1".to_string(), "ben-2".to_string()],
    }
}

/// 63 `a`s followed by `suffix`.
pub fn digest(suffix: char) -> String {
    format!("{}{}", "a".repeat(63), suffix)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Edit the record on line `index` in place, leaving every other line as is.
pub fn tamper_line(path: &Path, index: usize, edit: impl FnOnce(&mut Value)) {
    let mut lines = read_lines(path);
    let mut value: Value = serde_json::from_str(&lines[index]).unwrap();
    edit(&mut value);
    lines[index] = serde_json::to_string(&value).unwrap();
    fs::write(path, lines.join("\n") + "\n").unwrap();
}
