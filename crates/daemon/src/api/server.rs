/// API Server implementation

use super::handlers::*;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use fba_core::FbaNode;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Build the router with all wallet and ledger endpoints
pub fn router(node: Arc<FbaNode>) -> Router {
    let state = AppState { node };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Wallet endpoints
        .route("/api/wallet/generate", post(generate_wallet))
        .route("/api/wallet/import", post(import_wallet))
        .route("/api/wallet/balance/:address", get(get_balance))
        .route("/api/wallet/history/:address", get(get_history))
        .route("/api/wallet/send", post(send_transaction))
        .route("/api/wallet/validate/:address", get(validate_address))
        // Ledger endpoints
        .route("/api/ledger/stats", get(get_stats))
        .route("/api/ledger/transactions", get(get_transactions))
        .route("/api/ledger/pending", get(get_pending))
        .route("/api/ledger/consensus/:hash", get(get_consensus_status))
        .route("/api/ledger/nodes", get(get_nodes))
        .route("/api/ledger/faucet", post(faucet))
        // Allow browser clients on other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP API server in front of an [`FbaNode`]
pub struct ApiServer {
    listen_addr: SocketAddr,
    node: Arc<FbaNode>,
}

impl ApiServer {
    pub fn new(listen_addr: SocketAddr, node: Arc<FbaNode>) -> Self {
        Self { listen_addr, node }
    }

    /// Serve until the listener fails
    pub async fn start(self) -> Result<()> {
        let app = router(self.node.clone());

        info!("API server starting on {}", self.listen_addr);

        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;

        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("API server error: {}", e))?;

        Ok(())
    }
}
