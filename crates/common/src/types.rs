use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of fractional digits carried by [`Amount`]
pub const AMOUNT_DECIMALS: usize = 6;

/// Micro-units per whole coin
pub const MICROS_PER_COIN: u64 = 1_000_000;

/// Length of a transaction digest in bytes
pub const TX_HASH_LEN: usize = 32;

/// Fixed-point coin amount, stored in micro-units
///
/// Parses from and displays as a decimal string ("100", "0.5", "12.000001").
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Amount from raw micro-units
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Amount from whole coins, `None` on overflow
    pub fn from_coins(coins: u64) -> Option<Self> {
        coins.checked_mul(MICROS_PER_COIN).map(Self)
    }

    pub fn micros(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(&self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_COIN;
        let frac = self.0 % MICROS_PER_COIN;

        if frac == 0 {
            return write!(f, "{}", whole);
        }

        let digits = format!("{:0width$}", frac, width = AMOUNT_DECIMALS);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError::Empty);
        }

        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(AmountParseError::InvalidDigit(s.to_string()));
        }

        if frac.len() > AMOUNT_DECIMALS {
            return Err(AmountParseError::TooPrecise(frac.len()));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountParseError::Overflow)?
        };

        let frac: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS);
            padded.parse().map_err(|_| AmountParseError::Overflow)?
        };

        whole
            .checked_mul(MICROS_PER_COIN)
            .and_then(|micros| micros.checked_add(frac))
            .map(Amount)
            .ok_or(AmountParseError::Overflow)
    }
}

/// Errors produced when parsing a decimal amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount: {0}")]
    InvalidDigit(String),

    #[error("too many fractional digits: {0} (max 6)")]
    TooPrecise(usize),

    #[error("amount overflow")]
    Overflow,
}

/// Timestamp in Unix epoch seconds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Time elapsed between this timestamp and `now`, zero if `now` is earlier
    pub fn elapsed_at(&self, now: Timestamp) -> Duration {
        Duration::from_secs(now.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Digest identifying a transaction
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; TX_HASH_LEN]);

impl TxHash {
    pub fn from_bytes(bytes: [u8; TX_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TX_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, TxHashError> {
        let bytes = hex::decode(s).map_err(|e| TxHashError::InvalidHex(e.to_string()))?;
        if bytes.len() != TX_HASH_LEN {
            return Err(TxHashError::InvalidLength(bytes.len()));
        }
        let mut array = [0u8; TX_HASH_LEN];
        array.copy_from_slice(&bytes);
        Ok(Self(array))
    }

    /// Number of leading '0' characters in the hex representation
    pub fn leading_zero_nibbles(&self) -> u32 {
        let mut count = 0;
        for &byte in &self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Get a shortened display version (first 8 bytes as hex)
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}...)", self.short_hex())
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = TxHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxHashError {
    #[error("invalid transaction hash hex: {0}")]
    InvalidHex(String),

    #[error("invalid transaction hash length: expected 32, got {0}")]
    InvalidLength(usize),
}
