pub mod consensus;
pub mod error;
pub mod identity;
pub mod node;

pub use identity::{
    address_info, address_of, generate_keypair, generate_seed, is_valid_address,
    keypair_from_seed, sign_message, verify_signature, Address, AddressError, AddressInfo,
    HexKeyPair, KeyPair, KeyPairError, PublicKey, Signature64, ADDRESS_PREFIX,
};

// Re-export consensus types
pub use consensus::{
    ConsensusEngine, ConsensusError, ConsensusNode, ConsensusSnapshot, Direction, Ledger,
    LedgerStats, PendingEntry, PowError, ProofOfWork, Transaction, TransactionError,
    TxSignature, Verdict, Vote, VoteRecord, GENESIS_SIGNATURE,
};

pub use node::{
    ConfirmedPage, ConsensusReport, FbaNode, HistoryEntry, NodesView, PendingView, SendReceipt,
    SendRequest, SendStatus, Wallet,
};
