//! Conversions from module errors into the crate-spanning [`FbaError`]

use crate::consensus::{ConsensusError, PowError, TransactionError};
use crate::identity::{AddressError, KeyPairError};
use fba_common::FbaError;

impl From<TransactionError> for FbaError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Mining(pow) => pow.into(),
            TransactionError::Signing(e) => e.into(),
            TransactionError::InvalidSignature => FbaError::Signing(err.to_string()),
            other => FbaError::Validation(other.to_string()),
        }
    }
}

impl From<PowError> for FbaError {
    fn from(err: PowError) -> Self {
        match err {
            PowError::Exhausted { .. } | PowError::Cancelled { .. } => {
                FbaError::MiningTimeout(err.to_string())
            }
            PowError::DifficultyTooHigh(_) => FbaError::Config(err.to_string()),
        }
    }
}

impl From<KeyPairError> for FbaError {
    fn from(err: KeyPairError) -> Self {
        FbaError::Signing(err.to_string())
    }
}

impl From<AddressError> for FbaError {
    fn from(err: AddressError) -> Self {
        FbaError::InvalidAddress(err.to_string())
    }
}

impl From<ConsensusError> for FbaError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::NotFound(_) | ConsensusError::UnknownNode(_) => {
                FbaError::NotFound(err.to_string())
            }
            ConsensusError::DuplicateNode(_) => FbaError::Config(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fba_common::{Amount, TxHash};

    #[test]
    fn test_transaction_error_mapping() {
        let err: FbaError = TransactionError::InsufficientBalance {
            needed: Amount::from_micros(2),
            available: Amount::from_micros(1),
        }
        .into();
        assert!(matches!(err, FbaError::Validation(_)));

        let err: FbaError = TransactionError::InvalidSignature.into();
        assert!(matches!(err, FbaError::Signing(_)));

        let err: FbaError = TransactionError::Signing(KeyPairError::InvalidSecretKey).into();
        assert!(matches!(err, FbaError::Signing(_)));
    }

    #[test]
    fn test_mining_error_mapping() {
        let err: FbaError = TransactionError::Mining(PowError::Exhausted { iterations: 10 }).into();
        assert!(matches!(err, FbaError::MiningTimeout(_)));

        let err: FbaError = PowError::Cancelled { iterations: 0 }.into();
        assert!(matches!(err, FbaError::MiningTimeout(_)));

        let err: FbaError = PowError::DifficultyTooHigh(99).into();
        assert!(matches!(err, FbaError::Config(_)));
    }

    #[test]
    fn test_address_and_consensus_mapping() {
        let err: FbaError = AddressError::ChecksumMismatch.into();
        assert!(matches!(err, FbaError::InvalidAddress(_)));

        let err: FbaError = ConsensusError::NotFound(TxHash::from_bytes([0; 32])).into();
        assert!(matches!(err, FbaError::NotFound(_)));
        assert!(err.is_client_error());
    }
}
