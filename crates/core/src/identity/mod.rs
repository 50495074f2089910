//! Wallet identity: Ed25519 signing keys and the addresses derived from them

mod address;
mod keypair;

pub use address::{
    address_info, address_of, is_valid_address, Address, AddressError, AddressInfo,
    ADDRESS_PREFIX,
};
pub use keypair::{
    generate_keypair, generate_seed, keypair_from_seed, sign_message, verify_signature,
    HexKeyPair, KeyPair, KeyPairError, PublicKey, Signature64,
};
