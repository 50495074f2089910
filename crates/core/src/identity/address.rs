//! Wallet addresses
//!
//! An address is derived from the wallet's public key:
//! `"fba_" + base58(payload || checksum)` where `payload` is a 20-byte keyed
//! BLAKE3 hash of a 32-byte keyed hash of the public key, and `checksum` is a
//! 4-byte keyed hash of the payload.

use super::PublicKey;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix carried by every address
pub const ADDRESS_PREFIX: &str = "fba_";

pub const PAYLOAD_LEN: usize = 20;
pub const CHECKSUM_LEN: usize = 4;

const KEY_HASH_CONTEXT: &str = "fba-ledger 2024-01-01 address public key hash";
const PAYLOAD_CONTEXT: &str = "fba-ledger 2024-01-01 address payload";
const CHECKSUM_CONTEXT: &str = "fba-ledger 2024-01-01 address checksum";

/// A decoded wallet address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    payload: [u8; PAYLOAD_LEN],
}

impl Address {
    /// Derive the address of a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let mut key_hash = [0u8; 32];
        keyed_hash(KEY_HASH_CONTEXT, &public_key.as_bytes(), &mut key_hash);

        let mut payload = [0u8; PAYLOAD_LEN];
        keyed_hash(PAYLOAD_CONTEXT, &key_hash, &mut payload);

        Self { payload }
    }

    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }

    fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
        let mut checksum = [0u8; CHECKSUM_LEN];
        keyed_hash(CHECKSUM_CONTEXT, payload, &mut checksum);
        checksum
    }

    /// Parse and checksum-verify an address string
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let encoded = address
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::MissingPrefix)?;

        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding)?;

        if bytes.len() != PAYLOAD_LEN + CHECKSUM_LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }

        let (payload, checksum) = bytes.split_at(PAYLOAD_LEN);
        if checksum != Self::checksum(payload) {
            return Err(AddressError::ChecksumMismatch);
        }

        let mut array = [0u8; PAYLOAD_LEN];
        array.copy_from_slice(payload);
        Ok(Self { payload: array })
    }

    /// Verify that this address belongs to the given public key
    pub fn verify_public_key(&self, public_key: &PublicKey) -> bool {
        *self == Self::from_public_key(public_key)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(PAYLOAD_LEN + CHECKSUM_LEN);
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&Self::checksum(&self.payload));

        write!(f, "{}{}", ADDRESS_PREFIX, bs58::encode(bytes).into_string())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn keyed_hash(context: &str, input: &[u8], out: &mut [u8]) {
    let mut hasher = Hasher::new_derive_key(context);
    hasher.update(input);
    hasher.finalize_xof().fill(out);
}

/// Derive the address string for a public key
pub fn address_of(public_key: &PublicKey) -> String {
    Address::from_public_key(public_key).to_string()
}

/// Check prefix, encoding, length and checksum of an address
pub fn is_valid_address(address: &str) -> bool {
    Address::parse(address).is_ok()
}

/// Descriptive information about a valid address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: String,
    pub prefix: String,
    pub valid: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Describe `address`, or `None` if it is not valid
pub fn address_info(address: &str) -> Option<AddressInfo> {
    if !is_valid_address(address) {
        return None;
    }

    Some(AddressInfo {
        address: address.to_string(),
        prefix: ADDRESS_PREFIX.to_string(),
        valid: true,
        kind: "FBA Address".to_string(),
    })
}

/// Address errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Address must start with fba_")]
    MissingPrefix,

    #[error("Invalid base58 encoding")]
    InvalidEncoding,

    #[error("Invalid address length: {0} (expected 24)")]
    InvalidLength(usize),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,
}
