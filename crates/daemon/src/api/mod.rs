/// REST API module for the FBA ledger daemon
///
/// Wallet endpoints:
/// - key generation and import
/// - balances, history, address validation
/// - sending transfers
///
/// Ledger endpoints:
/// - statistics, confirmed and pending transactions
/// - consensus status and node membership
/// - the genesis faucet

pub mod handlers;
pub mod responses;
pub mod server;

pub use server::{router, ApiServer};
pub use responses::*;
