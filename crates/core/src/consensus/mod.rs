/// Ledger and consensus
///
/// Transactions are mined, signed and admitted to the pending pool, voted on
/// by a simulated federation of nodes, and applied to balances once the
/// federation accepts them.

mod engine;
mod ledger;
mod pow;
mod transaction;

pub use engine::{
    ConsensusEngine, ConsensusError, ConsensusNode, ConsensusSnapshot, Verdict, Vote, VoteRecord,
};
pub use ledger::{Ledger, LedgerStats, PendingEntry};
pub use pow::{PowError, ProofOfWork};
pub use transaction::{
    Direction, Transaction, TransactionError, TxSignature, GENESIS_SIGNATURE,
};
