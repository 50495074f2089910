/// API request and response types
///
/// Every successful response is wrapped in [`ApiResponse`]; failures use
/// [`ErrorResponse`]. Amounts inside transactions are integer micro-units.

use fba_common::{Amount, AmountParseError};
use fba_core::{AddressInfo, HistoryEntry, PendingView, Transaction};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Error message
    pub error: String,
    /// HTTP status code
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            success: false,
            error: error.into(),
            code,
        }
    }
}

/// Body of POST /api/wallet/import
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportWalletRequest {
    pub seed: String,
}

/// Body of POST /api/wallet/send
#[derive(Debug, Serialize, Deserialize)]
pub struct SendTransactionRequest {
    pub from_address: String,
    pub to_address: String,
    /// Amount in coins
    pub amount: CoinAmount,
    pub private_key: String,
}

/// A coin amount given either as a JSON number or a decimal string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoinAmount {
    Number(f64),
    Text(String),
}

impl CoinAmount {
    pub fn to_amount(&self) -> Result<Amount, AmountParseError> {
        match self {
            Self::Number(n) => Amount::from_str(&n.to_string()),
            Self::Text(s) => Amount::from_str(s.trim()),
        }
    }
}

/// Body of POST /api/ledger/faucet
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetResponse {
    pub message: String,
    pub transaction_hash: String,
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    /// Balance in micro-units
    pub balance: Amount,
    /// Balance in coins, e.g. "12.5"
    pub balance_display: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub address: String,
    pub transactions: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateAddressResponse {
    pub address: String,
    pub valid: bool,
    pub info: Option<AddressInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub transactions: Vec<PendingView>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

/// `?limit=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}
