/// API request handlers

use super::responses::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fba_common::{
    ledger::{DEFAULT_CONFIRMED_LIMIT, DEFAULT_HISTORY_LIMIT},
    FbaError, TxHash,
};
use fba_core::{
    ConsensusReport, FbaNode, LedgerStats, NodesView, SendReceipt, SendRequest, Wallet,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<FbaNode>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    debug!("API: GET /health");
    (StatusCode::OK, "OK")
}

/// Handler for POST /api/wallet/generate
pub async fn generate_wallet(State(state): State<AppState>) -> ApiResult<Wallet> {
    debug!("API: POST /api/wallet/generate");
    ok(state.node.generate_wallet()?)
}

/// Handler for POST /api/wallet/import
pub async fn import_wallet(
    State(state): State<AppState>,
    Json(request): Json<ImportWalletRequest>,
) -> ApiResult<Wallet> {
    debug!("API: POST /api/wallet/import");
    ok(state.node.import_wallet(&request.seed)?)
}

/// Handler for GET /api/wallet/balance/:address
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<BalanceResponse> {
    debug!("API: GET /api/wallet/balance/{}", address);

    let balance = state.node.balance(&address).await?;
    ok(BalanceResponse {
        address,
        balance,
        balance_display: balance.to_string(),
    })
}

/// Handler for GET /api/wallet/history/:address
pub async fn get_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<HistoryResponse> {
    debug!("API: GET /api/wallet/history/{}", address);

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let transactions = state.node.history(&address, limit).await?;
    ok(HistoryResponse {
        address,
        transactions,
    })
}

/// Handler for POST /api/wallet/send
pub async fn send_transaction(
    State(state): State<AppState>,
    Json(request): Json<SendTransactionRequest>,
) -> ApiResult<SendReceipt> {
    debug!("API: POST /api/wallet/send");

    let amount = request
        .amount
        .to_amount()
        .map_err(|e| AppError::bad_request(format!("Invalid amount: {}", e)))?;

    let receipt = state
        .node
        .send(SendRequest {
            from_address: request.from_address,
            to_address: request.to_address,
            amount,
            private_key: request.private_key,
        })
        .await?;
    ok(receipt)
}

/// Handler for GET /api/wallet/validate/:address
pub async fn validate_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<ValidateAddressResponse> {
    debug!("API: GET /api/wallet/validate/{}", address);

    let info = state.node.address_info(&address);
    ok(ValidateAddressResponse {
        address,
        valid: info.is_some(),
        info,
    })
}

/// Handler for GET /api/ledger/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<LedgerStats> {
    debug!("API: GET /api/ledger/stats");
    ok(state.node.stats().await)
}

/// Handler for GET /api/ledger/transactions
pub async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<TransactionsResponse> {
    debug!("API: GET /api/ledger/transactions");

    let page = state
        .node
        .confirmed(query.limit.unwrap_or(DEFAULT_CONFIRMED_LIMIT))
        .await;
    ok(TransactionsResponse {
        transactions: page.transactions,
        total: page.total,
    })
}

/// Handler for GET /api/ledger/pending
pub async fn get_pending(State(state): State<AppState>) -> ApiResult<PendingResponse> {
    debug!("API: GET /api/ledger/pending");

    let transactions = state.node.pending().await;
    let count = transactions.len();
    ok(PendingResponse {
        transactions,
        count,
    })
}

/// Handler for GET /api/ledger/consensus/:hash
pub async fn get_consensus_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<ConsensusReport> {
    debug!("API: GET /api/ledger/consensus/{}", hash);

    let hash: TxHash = hash
        .parse()
        .map_err(|e| AppError::bad_request(format!("Invalid transaction hash: {}", e)))?;
    ok(state.node.consensus_status(hash).await?)
}

/// Handler for GET /api/ledger/nodes
pub async fn get_nodes(State(state): State<AppState>) -> ApiResult<NodesView> {
    debug!("API: GET /api/ledger/nodes");
    ok(state.node.nodes().await)
}

/// Handler for POST /api/ledger/faucet
pub async fn faucet(
    State(state): State<AppState>,
    Json(request): Json<FaucetRequest>,
) -> ApiResult<FaucetResponse> {
    debug!("API: POST /api/ledger/faucet");

    let tx = state.node.faucet(&request.address).await?;
    let transaction_hash = tx.hash().map(|h| h.to_hex()).unwrap_or_default();
    ok(FaucetResponse {
        message: format!("Faucet successful! {} FBA coins sent.", tx.amount),
        transaction_hash,
        amount: tx.amount,
    })
}

/// Application error type
#[derive(Debug)]
pub struct AppError {
    message: String,
    status_code: StatusCode,

    /// Caused by the request rather than the node; logged at `warn`
    client_error: bool,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::BAD_REQUEST,
            client_error: true,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.client_error {
            warn!("API request rejected: {}", self.message);
        } else {
            error!("API Error: {}", self.message);
        }

        let body = Json(ErrorResponse::new(self.message, self.status_code.as_u16()));

        (self.status_code, body).into_response()
    }
}

impl From<FbaError> for AppError {
    fn from(err: FbaError) -> Self {
        let status_code = match &err {
            FbaError::Validation(_) | FbaError::InvalidAddress(_) | FbaError::Signing(_) => {
                StatusCode::BAD_REQUEST
            }
            FbaError::NotFound(_) => StatusCode::NOT_FOUND,
            FbaError::MiningTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            message: err.to_string(),
            status_code,
            client_error: err.is_client_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (FbaError::validation("x"), StatusCode::BAD_REQUEST),
            (FbaError::invalid_address("x"), StatusCode::BAD_REQUEST),
            (FbaError::signing("x"), StatusCode::BAD_REQUEST),
            (FbaError::not_found("x"), StatusCode::NOT_FOUND),
            (FbaError::MiningTimeout("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (FbaError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (FbaError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let app_error = AppError::from(err);
            assert_eq!(app_error.status_code(), expected);
            assert_eq!(app_error.client_error, expected.is_client_error());
        }

        assert!(AppError::bad_request("x").client_error);
    }
}
