/// FBA Ledger Daemon
///
/// Runs an FBA ledger node that:
/// - Keeps balances and the confirmed/pending transaction logs
/// - Simulates federated voting on every transfer
/// - Serves the wallet and ledger HTTP API

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

use fba_common::NodeConfig;
use fba_core::{FbaNode, LedgerStats};
use fba_daemon::ApiServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "help" | "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "version" | "--version" | "-v" => {
                println!("FBA Ledger Daemon v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "wallet" => {
                print_new_wallet()?;
            }
            "serve" => {
                run_server().await?;
            }
            _ => {
                eprintln!("Unknown command: {}", args[1]);
                eprintln!("Run with 'help' to see available commands");
                std::process::exit(1);
            }
        }
    } else {
        // Default: serve the API
        run_server().await?;
    }

    Ok(())
}

/// Load `fba.toml`, or write the defaults there on first run
fn load_config() -> Result<NodeConfig> {
    let config_path = PathBuf::from("fba.toml");

    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        NodeConfig::from_file(&config_path)?
    } else {
        info!("No configuration file found, using defaults");
        let config = NodeConfig::default();

        // Save default config for next time
        if let Err(e) = config.to_file(&config_path) {
            warn!("Failed to save default config: {}", e);
        } else {
            info!("Saved default configuration to {:?}", config_path);
        }

        config
    };

    Ok(config)
}

/// Run the node and its HTTP API until Ctrl+C
async fn run_server() -> Result<()> {
    info!("Starting FBA Ledger Daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let api_addr: SocketAddr = config.socket_addr().parse()?;

    let node = Arc::new(FbaNode::new(config)?);
    node.start().await;

    print_ledger_stats(&node.stats().await);

    let api_server = ApiServer::new(api_addr, node.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            warn!("API server error: {}", e);
        }
    });

    info!("Node is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = server => {
            warn!("API server exited");
        }
    }

    node.stop().await;
    info!("Node stopped");
    Ok(())
}

/// Generate a wallet and print it as JSON
fn print_new_wallet() -> Result<()> {
    let node = FbaNode::new(NodeConfig::default())?;
    let wallet = node.generate_wallet()?;

    println!("{}", serde_json::to_string_pretty(&wallet)?);
    Ok(())
}

/// Print ledger statistics
fn print_ledger_stats(stats: &LedgerStats) {
    println!("\n========================================");
    println!("          FBA Ledger Status");
    println!("========================================");
    println!("Confirmed:        {}", stats.total_transactions);
    println!("Pending:          {}", stats.pending_count);
    println!("Total Supply:     {}", stats.total_supply);
    println!("Circulating:      {}", stats.circulating_supply);
    println!("Active Addresses: {}", stats.active_addresses);
    println!("========================================\n");
}

/// Print help message
fn print_help() {
    println!("FBA Ledger Daemon - Federated Byzantine Agreement teaching ledger");
    println!();
    println!("USAGE:");
    println!("    fba-daemon [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    serve       Run the ledger node and HTTP API (default)");
    println!("    wallet      Generate a new wallet and print it");
    println!("    help        Show this help message");
    println!("    version     Show version information");
    println!();
    println!("CONFIGURATION:");
    println!("    Read from ./fba.toml; written with defaults on first run.");
    println!("    API:        127.0.0.1:5000 by default");
    println!();
    println!("EXAMPLES:");
    println!("    fba-daemon");
    println!("    curl -X POST http://localhost:5000/api/wallet/generate");
    println!("    curl -X POST http://localhost:5000/api/ledger/faucet \\");
    println!("         -H 'content-type: application/json' -d '{{\"address\": \"fba_...\"}}'");
}
