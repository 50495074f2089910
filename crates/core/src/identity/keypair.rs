use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of an Ed25519 seed / secret key
pub const SECRET_KEY_LEN: usize = 32;

/// Length of an Ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

/// A wallet keypair used to sign transactions
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; SECRET_KEY_LEN];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_secret_bytes(&secret_bytes)
    }

    /// Create a keypair from a 32-byte secret (the seed)
    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create a keypair from a hex-encoded secret
    pub fn from_hex(secret_hex: &str) -> Result<Self, KeyPairError> {
        let bytes = decode_fixed::<SECRET_KEY_LEN>(secret_hex.trim())
            .ok_or(KeyPairError::InvalidSecretKey)?;
        Ok(Self::from_secret_bytes(&bytes))
    }

    /// Get the secret key bytes
    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_LEN] {
        self.signing_key.to_bytes()
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_bytes())
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: self.verifying_key,
        }
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature64 {
        Signature64(self.signing_key.sign(message).to_bytes())
    }

    /// Verify a signature on a message
    pub fn verify(&self, message: &[u8], signature: &Signature64) -> bool {
        self.public_key().verify(message, signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_bytes()))
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A public key for verifying signatures
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from bytes
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, KeyPairError> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|_| KeyPairError::InvalidPublicKey)?;
        Ok(Self { key })
    }

    pub fn from_hex(public_hex: &str) -> Result<Self, KeyPairError> {
        let bytes = decode_fixed::<PUBLIC_KEY_LEN>(public_hex.trim())
            .ok_or(KeyPairError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Get the public key bytes
    pub fn as_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.key.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Verify a signature on a message
    pub fn verify(&self, message: &[u8], signature: &Signature64) -> bool {
        self.key
            .verify(message, &Signature::from_bytes(&signature.0))
            .is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Raw Ed25519 signature, hex-encoded on the wire
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature64(pub [u8; SIGNATURE_LEN]);

impl Signature64 {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyPairError> {
        decode_fixed::<SIGNATURE_LEN>(s.trim())
            .map(Self)
            .ok_or(KeyPairError::InvalidSignature)
    }
}

impl fmt::Debug for Signature64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature64({}...)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hex-encoded key material exchanged with the request layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexKeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl From<&KeyPair> for HexKeyPair {
    fn from(keypair: &KeyPair) -> Self {
        Self {
            private_key: keypair.secret_hex(),
            public_key: keypair.public_key().to_hex(),
        }
    }
}

/// Generate a fresh keypair, hex-encoded
pub fn generate_keypair() -> HexKeyPair {
    HexKeyPair::from(&KeyPair::generate())
}

/// Generate a random 32-byte seed, hex-encoded
pub fn generate_seed() -> String {
    let mut seed = [0u8; SECRET_KEY_LEN];
    OsRng.fill_bytes(&mut seed);
    hex::encode(seed)
}

/// Derive a keypair from a hex seed
pub fn keypair_from_seed(seed_hex: &str) -> Result<HexKeyPair, KeyPairError> {
    KeyPair::from_hex(seed_hex).map(|kp| HexKeyPair::from(&kp))
}

/// Sign `message` with a hex private key, returning a hex signature
pub fn sign_message(private_key_hex: &str, message: &[u8]) -> Result<String, KeyPairError> {
    let keypair = KeyPair::from_hex(private_key_hex)?;
    Ok(keypair.sign(message).to_hex())
}

/// Verify a hex signature; malformed inputs verify as `false`
pub fn verify_signature(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(public_key) = PublicKey::from_hex(public_key_hex) else {
        return false;
    };
    let Ok(signature) = Signature64::from_hex(signature_hex) else {
        return false;
    };
    public_key.verify(message, &signature)
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

/// Errors related to keypair operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyPairError {
    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature")]
    InvalidSignature,
}
