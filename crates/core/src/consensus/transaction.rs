use super::pow::{PowError, ProofOfWork};
use crate::identity::{KeyPair, KeyPairError, PublicKey, Signature64};
use fba_common::{is_genesis, ledger::GENESIS_ADDRESS, Amount, Timestamp, TxHash};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

/// Sentinel carried by genesis-sourced issuance in place of a signature
pub const GENESIS_SIGNATURE: &str = "genesis_signature";

/// A transfer between two addresses
///
/// `hash` always reflects the hashed fields at the time it was stored;
/// `mine` and `seal` are the only ways to set it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub from_address: String,

    pub to_address: String,

    pub amount: Amount,

    /// When the transaction was created
    pub timestamp: Timestamp,

    /// Proof-of-work nonce
    nonce: u64,

    /// Digest of the hashed fields, set by `seal` or `mine`
    hash: Option<TxHash>,

    /// Signature over `hash`
    signature: Option<TxSignature>,
}

impl Transaction {
    pub fn new(from_address: impl Into<String>, to_address: impl Into<String>, amount: Amount) -> Self {
        Self::with_timestamp(from_address, to_address, amount, Timestamp::now())
    }

    pub fn with_timestamp(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            timestamp,
            nonce: 0,
            hash: None,
            signature: None,
        }
    }

    /// Genesis-sourced issuance, sealed and carrying the sentinel signature
    pub fn genesis_issue(to_address: impl Into<String>, amount: Amount) -> Self {
        let mut tx = Self::new(GENESIS_ADDRESS, to_address, amount);
        tx.seal();
        tx.signature = Some(TxSignature::Genesis);
        tx
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.hash
    }

    pub fn signature(&self) -> Option<&TxSignature> {
        self.signature.as_ref()
    }

    pub fn is_genesis_issue(&self) -> bool {
        is_genesis(&self.from_address)
    }

    /// Digest of (from, to, amount, timestamp, nonce)
    pub fn compute_hash(&self) -> TxHash {
        Self::hash_with_nonce(
            &self.from_address,
            &self.to_address,
            self.amount,
            self.timestamp,
            self.nonce,
        )
    }

    fn hash_with_nonce(
        from_address: &str,
        to_address: &str,
        amount: Amount,
        timestamp: Timestamp,
        nonce: u64,
    ) -> TxHash {
        let mut hasher = blake3::Hasher::new();

        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        hasher.update(&(from_address.len() as u64).to_le_bytes());
        hasher.update(from_address.as_bytes());
        hasher.update(&(to_address.len() as u64).to_le_bytes());
        hasher.update(to_address.as_bytes());
        hasher.update(&amount.micros().to_le_bytes());
        hasher.update(&timestamp.as_secs().to_le_bytes());
        hasher.update(&nonce.to_le_bytes());

        TxHash::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Whether the stored hash matches the current fields
    pub fn is_hash_consistent(&self) -> bool {
        self.hash == Some(self.compute_hash())
    }

    /// Store the digest of the current fields without searching for a nonce
    pub fn seal(&mut self) -> TxHash {
        let hash = self.compute_hash();
        if self.hash != Some(hash) {
            self.signature = None;
        }
        self.hash = Some(hash);
        hash
    }

    /// Search for a nonce meeting `difficulty`, with no iteration bound
    pub fn mine(&mut self, difficulty: u32) -> Result<TxHash, TransactionError> {
        self.mine_bounded(difficulty, u64::MAX, &AtomicBool::new(false))
    }

    /// Search for a nonce meeting `difficulty`
    ///
    /// Nonce and hash are only written on success; a timed-out or cancelled
    /// search leaves the record untouched. A successful search drops any
    /// existing signature, which covered the old hash.
    pub fn mine_bounded(
        &mut self,
        difficulty: u32,
        max_iterations: u64,
        cancel: &AtomicBool,
    ) -> Result<TxHash, TransactionError> {
        let pow = ProofOfWork::search(self.nonce, difficulty, max_iterations, cancel, |nonce| {
            Self::hash_with_nonce(
                &self.from_address,
                &self.to_address,
                self.amount,
                self.timestamp,
                nonce,
            )
        })?;

        self.nonce = pow.nonce;
        self.hash = Some(pow.hash);
        self.signature = None;

        Ok(pow.hash)
    }

    /// Whether the stored hash is current and meets `difficulty`
    pub fn has_valid_pow(&self, difficulty: u32) -> bool {
        match self.hash {
            Some(hash) => {
                self.is_hash_consistent() && ProofOfWork::meets_difficulty(&hash, difficulty)
            }
            None => false,
        }
    }

    /// Sign the stored hash
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), TransactionError> {
        let hash = self.hash.ok_or(TransactionError::MissingHash)?;
        if hash != self.compute_hash() {
            return Err(TransactionError::StaleHash);
        }

        self.signature = Some(TxSignature::Ed25519(keypair.sign(hash.as_bytes())));
        Ok(())
    }

    /// Sign the stored hash with a hex-encoded private key
    pub fn sign_with_hex(&mut self, private_key_hex: &str) -> Result<(), TransactionError> {
        let keypair = KeyPair::from_hex(private_key_hex)?;
        self.sign(&keypair)
    }

    /// Check the signature against `public_key`
    ///
    /// The genesis sentinel only verifies for genesis-sourced records.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        let (Some(hash), Some(signature)) = (self.hash, self.signature.as_ref()) else {
            return false;
        };

        if hash != self.compute_hash() {
            return false;
        }

        match signature {
            TxSignature::Ed25519(sig) => public_key.verify(hash.as_bytes(), sig),
            TxSignature::Genesis => self.is_genesis_issue(),
        }
    }

    /// `verify` with a hex-encoded public key; malformed keys verify as `false`
    pub fn verify_hex(&self, public_key_hex: &str) -> bool {
        PublicKey::from_hex(public_key_hex)
            .map(|pk| self.verify(&pk))
            .unwrap_or(false)
    }

    /// Whether `address` sent or received this transaction
    pub fn direction_for(&self, address: &str) -> Option<Direction> {
        if self.from_address == address {
            Some(Direction::Sent)
        } else if self.to_address == address {
            Some(Direction::Received)
        } else {
            None
        }
    }
}

/// Signature attached to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSignature {
    Ed25519(Signature64),

    /// Sentinel used by genesis-sourced issuance
    Genesis,
}

impl TxSignature {
    pub fn to_hex_or_sentinel(&self) -> String {
        match self {
            Self::Ed25519(sig) => sig.to_hex(),
            Self::Genesis => GENESIS_SIGNATURE.to_string(),
        }
    }
}

impl Serialize for TxSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_or_sentinel())
    }
}

impl<'de> Deserialize<'de> for TxSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == GENESIS_SIGNATURE {
            return Ok(Self::Genesis);
        }
        Signature64::from_hex(&s)
            .map(Self::Ed25519)
            .map_err(serde::de::Error::custom)
    }
}

/// Direction of a transaction relative to an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Transaction validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),

    #[error("Transaction has no hash")]
    MissingHash,

    #[error("Transaction has no signature")]
    MissingSignature,

    #[error("Stored hash does not match transaction fields")]
    StaleHash,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid sender")]
    InvalidSender,

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Transaction {0} already confirmed")]
    AlreadyConfirmed(TxHash),

    #[error("Transaction {0} was never admitted to pending")]
    NotPending(TxHash),

    #[error("Signing failed: {0}")]
    Signing(#[from] KeyPairError),

    #[error("Mining failed: {0}")]
    Mining(#[from] PowError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::address_of;

    fn transfer(amount: u64) -> Transaction {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        Transaction::with_timestamp(
            address_of(&kp1.public_key()),
            address_of(&kp2.public_key()),
            Amount::from_coins(amount).unwrap(),
            Timestamp::from_secs(1_700_000_000),
        )
    }

    #[test]
    fn test_transaction_creation() {
        let tx = Transaction::new("fba_a", "fba_b", Amount::from_coins(100).unwrap());

        assert_eq!(tx.amount, Amount::from_coins(100).unwrap());
        assert_eq!(tx.nonce(), 0);
        assert!(tx.hash().is_none());
        assert!(tx.signature().is_none());
    }

    #[test]
    fn test_hash_determinism() {
        let tx = transfer(10);
        assert_eq!(tx.compute_hash(), tx.compute_hash());

        let copy = Transaction::with_timestamp(
            tx.from_address.clone(),
            tx.to_address.clone(),
            tx.amount,
            tx.timestamp,
        );
        assert_eq!(tx.compute_hash(), copy.compute_hash());
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = Transaction::with_timestamp(
            "ab",
            "c",
            Amount::from_micros(5),
            Timestamp::from_secs(1),
        );

        let shifted = Transaction::with_timestamp(
            "a",
            "bc",
            Amount::from_micros(5),
            Timestamp::from_secs(1),
        );
        assert_ne!(base.compute_hash(), shifted.compute_hash());

        let mut other = base.clone();
        other.amount = Amount::from_micros(6);
        assert_ne!(base.compute_hash(), other.compute_hash());

        let mut other = base.clone();
        other.timestamp = Timestamp::from_secs(2);
        assert_ne!(base.compute_hash(), other.compute_hash());

        let mut other = base.clone();
        other.nonce = 1;
        assert_ne!(base.compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_compute_hash_does_not_store() {
        let tx = transfer(1);
        let _ = tx.compute_hash();
        assert!(tx.hash().is_none());
    }

    #[test]
    fn test_mining_postcondition() {
        for difficulty in 0..=3 {
            let mut tx = transfer(5);
            let hash = tx.mine(difficulty).unwrap();

            assert_eq!(tx.hash(), Some(hash));
            assert_eq!(hash, tx.compute_hash());
            assert!(hash.leading_zero_nibbles() >= difficulty);
            assert!(tx.has_valid_pow(difficulty));
        }
    }

    #[test]
    fn test_bounded_mining_leaves_record_untouched() {
        let mut tx = transfer(5);
        let before = tx.clone();

        let result = tx.mine_bounded(64, 50, &AtomicBool::new(false));
        assert!(matches!(
            result,
            Err(TransactionError::Mining(PowError::Exhausted { .. }))
        ));
        assert_eq!(tx, before);

        let result = tx.mine_bounded(4, u64::MAX, &AtomicBool::new(true));
        assert!(matches!(
            result,
            Err(TransactionError::Mining(PowError::Cancelled { .. }))
        ));
        assert_eq!(tx, before);
    }

    #[test]
    fn test_sign_requires_hash() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(1);

        assert_eq!(tx.sign(&keypair), Err(TransactionError::MissingHash));
    }

    #[test]
    fn test_sign_rejects_stale_hash() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(1);
        tx.seal();
        tx.amount = Amount::from_coins(2).unwrap();

        assert_eq!(tx.sign(&keypair), Err(TransactionError::StaleHash));
    }

    #[test]
    fn test_mine_then_sign_then_verify() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new(
            address_of(&keypair.public_key()),
            "fba_dest",
            Amount::from_coins(3).unwrap(),
        );

        tx.mine(2).unwrap();
        tx.sign(&keypair).unwrap();

        assert!(tx.verify(&keypair.public_key()));
        assert!(tx.verify_hex(&keypair.public_key().to_hex()));
        assert!(!tx.verify(&KeyPair::generate().public_key()));
        assert!(!tx.verify_hex("not-a-key"));
    }

    #[test]
    fn test_mining_drops_stale_signature() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(1);
        tx.seal();
        tx.sign(&keypair).unwrap();

        tx.mine(1).unwrap();
        assert!(tx.signature().is_none());
        assert!(!tx.verify(&keypair.public_key()));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(1);
        tx.seal();
        tx.sign(&keypair).unwrap();

        tx.amount = Amount::from_coins(1_000).unwrap();
        assert!(!tx.verify(&keypair.public_key()));
    }

    #[test]
    fn test_sign_with_malformed_key() {
        let mut tx = transfer(1);
        tx.seal();

        assert_eq!(
            tx.sign_with_hex("zz"),
            Err(TransactionError::Signing(KeyPairError::InvalidSecretKey))
        );
    }

    #[test]
    fn test_genesis_sentinel() {
        let any_key = KeyPair::generate().public_key();

        let tx = Transaction::genesis_issue("fba_someone", Amount::from_coins(100).unwrap());
        assert!(tx.is_genesis_issue());
        assert_eq!(tx.signature(), Some(&TxSignature::Genesis));
        assert!(tx.verify(&any_key));

        // The sentinel is worthless on a regular sender
        let mut forged = transfer(1);
        forged.seal();
        forged.signature = Some(TxSignature::Genesis);
        assert!(!forged.verify(&any_key));
    }

    #[test]
    fn test_direction_for() {
        let tx = Transaction::new("fba_a", "fba_b", Amount::from_micros(1));

        assert_eq!(tx.direction_for("fba_a"), Some(Direction::Sent));
        assert_eq!(tx.direction_for("fba_b"), Some(Direction::Received));
        assert_eq!(tx.direction_for("fba_c"), None);
    }

    #[test]
    fn test_transaction_json_roundtrip() {
        let keypair = KeyPair::generate();
        let mut tx = transfer(7);
        tx.mine(1).unwrap();
        tx.sign(&keypair).unwrap();

        let json = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, tx);

        let bytes = bincode::serialize(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert!(decoded.verify(&keypair.public_key()));

        let genesis = Transaction::genesis_issue("fba_x", Amount::from_coins(1).unwrap());
        let json = serde_json::to_value(&genesis).unwrap();
        assert_eq!(json["signature"], GENESIS_SIGNATURE);
    }
}
