//! Newline-delimited JSON storage
//!
//! One JSON object per line, append-only. Readers scan from the start and
//! tolerate blank or malformed lines; writers append a single line and sync it
//! to disk before returning.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LedgerError, Result};

/// A non-blank line read back from a store.
#[derive(Debug, Clone)]
pub enum StoredLine {
    /// Line parsed as a JSON object.
    Record { line: usize, value: Value },
    /// Line that is not a JSON object.
    Corrupt { line: usize, reason: String },
}

impl StoredLine {
    pub fn line(&self) -> usize {
        match self {
            StoredLine::Record { line, .. } | StoredLine::Corrupt { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory holding the store.
    pub fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| LedgerError::storage("Failed to create ledger directory", e))?;
            }
        }
        Ok(())
    }

    /// True when the store is missing or holds zero bytes.
    pub fn is_empty(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LedgerError::storage("Failed to stat ledger file", e)),
        }
    }

    /// Raw lines of the store, blank ones included. A missing store has none.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::storage("Failed to read ledger file", e)),
        };

        // Invalid UTF-8 only spoils the lines it appears on.
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Every non-blank line in file order, parsed or flagged corrupt.
    pub fn entries(&self) -> Result<Vec<StoredLine>> {
        let entries = self
            .read_lines()?
            .into_iter()
            .enumerate()
            .filter(|(_, raw)| !raw.trim().is_empty())
            .map(|(idx, raw)| parse_line(idx + 1, &raw))
            .collect();
        Ok(entries)
    }

    /// All well-formed records of type `T`, oldest first.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for entry in self.entries()? {
            if let Some(record) = typed(entry) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Last well-formed record of type `T`. Malformed trailing lines are skipped,
    /// so `None` means the store holds no parseable record at all.
    pub fn last<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let mut last = None;
        for entry in self.entries()? {
            if let Some(record) = typed(entry) {
                last = Some(record);
            }
        }
        Ok(last)
    }

    /// Append one line and sync it.
    pub fn append_line(&self, line: &str) -> Result<()> {
        self.ensure_parent()?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::storage("Failed to open ledger file", e))?;

        // A torn final line must not swallow the new record.
        if ends_without_newline(&mut file)? {
            debug!("Terminating torn last line of {}", self.path.display());
            file.write_all(b"\n")
                .map_err(|e| LedgerError::storage("Failed to write ledger record", e))?;
        }

        writeln!(file, "{}", line)
            .map_err(|e| LedgerError::storage("Failed to write ledger record", e))?;
        file.flush()
            .map_err(|e| LedgerError::storage("Failed to flush ledger file", e))?;
        file.sync_data()
            .map_err(|e| LedgerError::storage("Failed to sync ledger file", e))?;
        Ok(())
    }

    /// Replace the first non-blank line, leaving every later byte untouched.
    /// The rewrite goes through a sibling temp file and a rename.
    pub fn replace_first_line(&self, line: &str) -> Result<()> {
        let original = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(LedgerError::storage("Failed to read ledger file", e)),
        };

        let mut contents = Vec::with_capacity(original.len() + line.len() + 1);
        match first_non_blank_line(&original) {
            Some((start, end)) => {
                contents.extend_from_slice(&original[..start]);
                contents.extend_from_slice(line.as_bytes());
                contents.push(b'\n');
                contents.extend_from_slice(&original[end..]);
            }
            None => {
                contents.extend_from_slice(line.as_bytes());
                contents.push(b'\n');
            }
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&tmp)
                .map_err(|e| LedgerError::storage("Failed to create temp ledger file", e))?;
            file.write_all(&contents)
                .map_err(|e| LedgerError::storage("Failed to write temp ledger file", e))?;
            file.sync_all()
                .map_err(|e| LedgerError::storage("Failed to sync temp ledger file", e))?;
        }
        fs::rename(&tmp, &self.path)
            .map_err(|e| LedgerError::storage("Failed to replace ledger file", e))?;
        Ok(())
    }
}

/// Byte range of the first non-blank line, its terminator included.
fn first_non_blank_line(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut start = 0;
    while start < bytes.len() {
        let end = bytes[start..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|pos| start + pos + 1)
            .unwrap_or(bytes.len());
        if !bytes[start..end].iter().all(u8::is_ascii_whitespace) {
            return Some((start, end));
        }
        start = end;
    }
    None
}

fn ends_without_newline(file: &mut fs::File) -> Result<bool> {
    let len = file
        .metadata()
        .map_err(|e| LedgerError::storage("Failed to stat ledger file", e))?
        .len();
    if len == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| LedgerError::storage("Failed to read ledger file", e))?;
    Ok(last[0] != b'\n')
}

fn parse_line(line: usize, raw: &str) -> StoredLine {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ Value::Object(_)) => StoredLine::Record { line, value },
        Ok(_) => StoredLine::Corrupt {
            line,
            reason: "not a JSON object".to_string(),
        },
        Err(e) => StoredLine::Corrupt {
            line,
            reason: e.to_string(),
        },
    }
}

fn typed<T: DeserializeOwned>(entry: StoredLine) -> Option<T> {
    let skipped = match entry {
        StoredLine::Record { line, value } => match serde_json::from_value(value) {
            Ok(record) => return Some(record),
            Err(e) => LedgerError::CorruptRecord {
                line,
                reason: format!("unexpected record shape: {}", e),
            },
        },
        StoredLine::Corrupt { line, reason } => LedgerError::CorruptRecord { line, reason },
    };
    debug!("Skipping {}", skipped);
    None
}
