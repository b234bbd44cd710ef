//! EVM legacy transactions
//!
//! Just enough RLP and EIP-155 signing to submit a zero-value, self-addressed
//! transaction whose calldata carries an anchored hash.

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use tiny_keccak::{Hasher, Keccak};

use crate::error::{LedgerError, Result};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub mod rlp {
    pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
        if bytes.len() == 1 && bytes[0] < 0x80 {
            return vec![bytes[0]];
        }
        let mut out = length_prefix(bytes.len(), 0x80);
        out.extend_from_slice(bytes);
        out
    }

    /// Scalars are big-endian with no leading zeros; zero is the empty string.
    pub fn encode_uint(value: u128) -> Vec<u8> {
        encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
    }

    pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload: Vec<u8> = items.concat();
        let mut out = length_prefix(payload.len(), 0xc0);
        out.extend_from_slice(&payload);
        out
    }

    pub fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[start..].to_vec()
    }

    fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
        if len <= 55 {
            vec![offset + len as u8]
        } else {
            let len_bytes = trim_leading_zeros(&(len as u64).to_be_bytes());
            let mut out = vec![offset + 55 + len_bytes.len() as u8];
            out.extend_from_slice(&len_bytes);
            out
        }
    }
}

/// Account key for signing transactions.
pub struct SigningKey {
    secret: SecretKey,
    address: [u8; 20],
}

impl SigningKey {
    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped)
            .map_err(|e| LedgerError::AnchorNotConfigured(format!("Invalid private key hex: {}", e)))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| LedgerError::AnchorNotConfigured(format!("Invalid private key: {}", e)))?;

        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret).serialize_uncompressed();
        let digest = keccak256(&public[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);

        Ok(Self { secret, address })
    }

    pub fn address(&self) -> [u8; 20] {
        self.address
    }

    pub fn address_hex(&self) -> String {
        to_hex_prefixed(&self.address)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address_hex())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_uint(self.nonce as u128),
            rlp::encode_uint(self.gas_price),
            rlp::encode_uint(self.gas_limit as u128),
            rlp::encode_bytes(&self.to),
            rlp::encode_uint(self.value),
            rlp::encode_bytes(&self.data),
        ]
    }

    /// EIP-155 signing payload: the six fields plus `chain_id, 0, 0`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut fields = self.base_fields();
        fields.push(rlp::encode_uint(self.chain_id as u128));
        fields.push(rlp::encode_uint(0));
        fields.push(rlp::encode_uint(0));
        rlp::encode_list(&fields)
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    pub fn sign(&self, key: &SigningKey) -> Result<SignedTransaction> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(&self.signing_hash())
            .map_err(|e| LedgerError::unavailable("Invalid transaction digest", e))?;
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, &key.secret)
            .serialize_compact();

        let v = recovery_id.to_i32() as u128 + self.chain_id as u128 * 2 + 35;
        let mut fields = self.base_fields();
        fields.push(rlp::encode_uint(v));
        fields.push(rlp::encode_bytes(&rlp::trim_leading_zeros(&compact[..32])));
        fields.push(rlp::encode_bytes(&rlp::trim_leading_zeros(&compact[32..])));

        let raw = rlp::encode_list(&fields);
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash })
    }
}
