//! External chain client
//!
//! Submits one self-addressed transaction per anchor over Ethereum JSON-RPC.
//! Gas price and account nonce are fetched on every call; the node's pending
//! count is combined with the last nonce this client used so nonces never go
//! backwards while a previous transaction is still propagating.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::anchor::tx::{to_hex_prefixed, LegacyTransaction, SigningKey};
use crate::config::ExternalChainConfig;
use crate::error::{LedgerError, Result};

/// Receipt of a submitted anchoring transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReceipt {
    pub transaction_id: String,
    pub sender: String,
    pub recipient: String,
    pub payload_hex: String,
    pub network_id: u64,
}

#[async_trait]
pub trait ExternalChainClient: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn anchor_text(&self, text: &str) -> Result<ExternalReceipt>;
}

/// JSON-RPC client for EVM-compatible nodes.
pub struct JsonRpcChainClient {
    http_client: Client,
    config: ExternalChainConfig,
    key: Option<SigningKey>,
    last_nonce: Mutex<Option<u64>>,
}

impl JsonRpcChainClient {
    /// Build a client. Incomplete settings produce an unconfigured client;
    /// a malformed key is an error.
    pub fn new(config: ExternalChainConfig) -> Result<Self> {
        let key = if config.private_key.trim().is_empty() {
            None
        } else {
            Some(SigningKey::from_hex(&config.private_key)?)
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::unavailable("Failed to build HTTP client", e))?;

        Ok(Self {
            http_client,
            config,
            key,
            last_nonce: Mutex::new(None),
        })
    }

    pub fn sender(&self) -> Option<String> {
        self.key.as_ref().map(SigningKey::address_hex)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.config.provider_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::unavailable(method, e))?
            .error_for_status()
            .map_err(|e| LedgerError::unavailable(method, e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::unavailable(method, e))?;

        if let Some(error) = body.get("error") {
            return Err(LedgerError::AnchorUnavailable(format!(
                "{} rejected: {}",
                method, error
            )));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::AnchorUnavailable(format!("{} returned no result", method)))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let result = self.call(method, params).await?;
        let raw = result.as_str().ok_or_else(|| {
            LedgerError::AnchorUnavailable(format!("{} returned a non-string quantity", method))
        })?;
        parse_quantity(raw)
            .ok_or_else(|| LedgerError::AnchorUnavailable(format!("{} returned '{}'", method, raw)))
    }
}

#[async_trait]
impl ExternalChainClient for JsonRpcChainClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured() && self.key.is_some()
    }

    async fn anchor_text(&self, text: &str) -> Result<ExternalReceipt> {
        let key = match &self.key {
            Some(key) if self.config.is_configured() => key,
            _ => {
                return Err(LedgerError::AnchorNotConfigured(
                    "provider url, private key, chain id and gas limit are required".to_string(),
                ))
            }
        };
        let sender = key.address_hex();

        // One submission at a time per account.
        let mut last_nonce = self.last_nonce.lock().await;

        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let pending = self
            .quantity("eth_getTransactionCount", json!([sender, "pending"]))
            .await? as u64;
        let nonce = match *last_nonce {
            Some(last) if last >= pending => last + 1,
            _ => pending,
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: self.config.gas_limit,
            to: key.address(),
            value: 0,
            data: text.as_bytes().to_vec(),
            chain_id: self.config.chain_id,
        };
        let signed = tx.sign(key)?;
        debug!("Submitting anchor transaction nonce {} gas price {}", nonce, gas_price);

        let result = self
            .call("eth_sendRawTransaction", json!([to_hex_prefixed(&signed.raw)]))
            .await?;
        *last_nonce = Some(nonce);

        let transaction_id = result
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| to_hex_prefixed(&signed.hash));

        info!("Anchored {} in transaction {}", text, transaction_id);
        Ok(ExternalReceipt {
            transaction_id,
            sender: sender.clone(),
            recipient: sender,
            payload_hex: to_hex_prefixed(text.as_bytes()),
            network_id: self.config.chain_id,
        })
    }
}

/// Parse a JSON-RPC hex quantity such as `0x3b9aca00`.
pub fn parse_quantity(raw: &str) -> Option<u128> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}
