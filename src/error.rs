use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo(format!("Storage I/O error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    StorageIo(String),

    #[error("Corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Mining gave up after {attempts} attempts ({elapsed_ms} ms)")]
    MiningTimeout { attempts: u64, elapsed_ms: u128 },

    #[error("Anchoring not configured: {0}")]
    AnchorNotConfigured(String),

    #[error("Anchoring unavailable: {0}")]
    AnchorUnavailable(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LedgerError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::StorageIo(format!("{}: {}", context, err))
    }

    pub fn unavailable(context: &str, err: impl std::fmt::Display) -> Self {
        Self::AnchorUnavailable(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
