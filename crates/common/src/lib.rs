//! Shared types, errors and configuration for the FBA ledger

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    api, consensus, ledger, mining, ConfigError, ConsensusNodeConfig, NodeConfig, ThresholdRule,
};
pub use error::{FbaError, Result};
pub use types::{
    Amount, AmountParseError, Timestamp, TxHash, TxHashError, AMOUNT_DECIMALS, MICROS_PER_COIN,
    TX_HASH_LEN,
};

/// Whether `address` is the reserved genesis issuance source
pub fn is_genesis(address: &str) -> bool {
    address == ledger::GENESIS_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_genesis() {
        assert!(is_genesis("genesis"));
        assert!(!is_genesis("Genesis"));
        assert!(!is_genesis("fba_abc"));
    }

    #[test]
    fn test_amount_bincode_roundtrip() {
        let amount = Amount::from_coins(42).unwrap();
        let encoded = bincode::serialize(&amount).unwrap();
        let decoded: Amount = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, amount);
    }
}
