use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::LedgerError;

/// Longest possible run of leading zeros in a 64-char SHA-256 hex digest.
pub const MAX_DIFFICULTY: u32 = 64;

/// Where ledger record hashes get anchored, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    #[default]
    Off,
    Local,
    #[serde(alias = "eth")]
    External,
}

impl AnchorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorMode::Off => "off",
            AnchorMode::Local => "local",
            AnchorMode::External => "external",
        }
    }
}

impl fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" => Ok(AnchorMode::Off),
            "local" => Ok(AnchorMode::Local),
            "external" | "eth" => Ok(AnchorMode::External),
            other => Err(LedgerError::ConfigError(format!(
                "Unknown anchoring mode '{}': expected off, local or external",
                other
            ))),
        }
    }
}

/// Local proof-of-work chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowConfig {
    pub difficulty: u32,
    pub max_attempts: u64,
    pub max_seconds: u64,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            max_attempts: 50_000_000,
            max_seconds: 60,
        }
    }
}

impl PowConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_seconds)
    }
}

/// External EVM-compatible chain settings, only needed in external mode.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalChainConfig {
    pub provider_url: String,
    pub private_key: String,
    pub chain_id: u64,
    pub gas_limit: u64,
}

impl Default for ExternalChainConfig {
    fn default() -> Self {
        Self {
            provider_url: String::new(),
            private_key: String::new(),
            chain_id: 11_155_111,
            gas_limit: 100_000,
        }
    }
}

impl ExternalChainConfig {
    pub fn is_configured(&self) -> bool {
        !self.provider_url.trim().is_empty()
            && !self.private_key.trim().is_empty()
            && self.chain_id != 0
            && self.gas_limit != 0
    }
}

// Keeps the signing key out of logs.
impl fmt::Debug for ExternalChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalChainConfig")
            .field("provider_url", &self.provider_url)
            .field("private_key", &if self.private_key.is_empty() { "" } else { "<redacted>" })
            .field("chain_id", &self.chain_id)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger_dir: PathBuf,
    pub blockchain_mode: AnchorMode,
    pub pow: PowConfig,
    pub external: ExternalChainConfig,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger_dir: PathBuf::from("./ledger"),
            blockchain_mode: AnchorMode::Off,
            pow: PowConfig::default(),
            external: ExternalChainConfig::default(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
        }
    }
}

impl AppConfig {
    /// Load configuration: optional TOML file from `GUARDIAN_CONFIG`, then
    /// environment variables on top.
    pub fn load() -> Result<Self, LedgerError> {
        let mut config = match env::var("GUARDIAN_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, LedgerError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;

        let config: AppConfig = toml::from_str(&contents).map_err(|e| {
            LedgerError::ConfigError(format!("Failed to parse {:?}: {}", path, e))
        })?;

        info!("Loaded configuration file {:?}", path);
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), LedgerError> {
        if let Ok(dir) = env::var("LEDGER_DIR") {
            self.ledger_dir = PathBuf::from(dir);
        }
        if let Some(mode) = env_parse::<AnchorMode>("BLOCKCHAIN_MODE")? {
            self.blockchain_mode = mode;
        }
        if let Some(difficulty) = env_parse("POW_DIFFICULTY")? {
            self.pow.difficulty = difficulty;
        }
        if let Some(max_attempts) = env_parse("POW_MAX_ATTEMPTS")? {
            self.pow.max_attempts = max_attempts;
        }
        if let Some(max_seconds) = env_parse("POW_MAX_SECONDS")? {
            self.pow.max_seconds = max_seconds;
        }
        if let Ok(url) = env::var("ETH_PROVIDER_URL") {
            self.external.provider_url = url;
        }
        if let Ok(key) = env::var("ETH_PRIVATE_KEY") {
            self.external.private_key = key;
        }
        if let Some(chain_id) = env_parse("ETH_CHAIN_ID")? {
            self.external.chain_id = chain_id;
        }
        if let Some(gas_limit) = env_parse("ETH_GAS_LIMIT")? {
            self.external.gas_limit = gas_limit;
        }
        if let Ok(host) = env::var("SERVER_HOST") {
            self.server_host = host;
        }
        if let Some(port) = env_parse("SERVER_PORT")? {
            self.server_port = port;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.pow.difficulty == 0 || self.pow.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::ConfigError(format!(
                "POW_DIFFICULTY must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.pow.difficulty
            )));
        }
        if self.pow.max_attempts == 0 {
            return Err(LedgerError::ConfigError(
                "POW_MAX_ATTEMPTS must be positive".to_string(),
            ));
        }
        if self.pow.max_seconds == 0 {
            return Err(LedgerError::ConfigError(
                "POW_MAX_SECONDS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn evidence_ledger_path(&self) -> PathBuf {
        self.ledger_dir.join("chain.jsonl")
    }

    pub fn events_ledger_path(&self) -> PathBuf {
        self.ledger_dir.join("events_chain.jsonl")
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.ledger_dir.join("blocks.jsonl")
    }

    pub fn anchors_path(&self) -> PathBuf {
        self.ledger_dir.join("anchors.jsonl")
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, LedgerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| LedgerError::ConfigError(format!("Invalid {}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
