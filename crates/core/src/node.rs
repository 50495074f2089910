/// FBA node runtime
///
/// Owns the ledger and the consensus engine and drives the transaction flow:
/// build, mine, sign, admit to the pending pool, vote, and finalize on an
/// accept verdict.

use crate::consensus::{
    ConsensusEngine, ConsensusNode, ConsensusSnapshot, Direction, Ledger, LedgerStats,
    ProofOfWork, Transaction, TransactionError, Verdict, VoteRecord,
};
use crate::identity::{
    address_info, address_of, generate_seed, is_valid_address, keypair_from_seed, AddressInfo,
    KeyPair,
};
use fba_common::{Amount, FbaError, NodeConfig, Result, ThresholdRule, Timestamp, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// How often the background task drops stale pending transactions
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Main FBA node runtime
pub struct FbaNode {
    /// Node configuration
    config: NodeConfig,

    /// Coins issued per faucet request
    faucet_amount: Amount,

    /// Balances, confirmed log and pending pool
    ledger: Arc<RwLock<Ledger>>,

    /// Node registry, quorum slices and votes
    consensus: Arc<RwLock<ConsensusEngine>>,

    /// Whether background tasks are running
    running: Arc<RwLock<bool>>,
}

impl FbaNode {
    /// Create a new node with the given configuration
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;

        let genesis_balance = Amount::from_coins(config.genesis_balance)
            .ok_or_else(|| FbaError::Config("genesis_balance overflows".into()))?;
        let faucet_amount = Amount::from_coins(config.faucet_amount)
            .ok_or_else(|| FbaError::Config("faucet_amount overflows".into()))?;

        let ledger = Ledger::new(genesis_balance);
        let consensus = ConsensusEngine::from_config(&config)?;

        info!(
            "Initialized FBA node: {} consensus nodes, threshold {}, mining difficulty {}",
            consensus.node_count(),
            consensus.threshold(),
            config.mining_difficulty
        );

        Ok(Self {
            config,
            faucet_amount,
            ledger: Arc::new(RwLock::new(ledger)),
            consensus: Arc::new(RwLock::new(consensus)),
            running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Start background tasks
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let running = self.running.clone();
        let ledger = self.ledger.clone();
        let consensus = self.consensus.clone();
        let ttl = self.config.pending_ttl();

        // Pending expiry task
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(EXPIRY_SWEEP_INTERVAL).await;
                if !*running.read().await {
                    break;
                }
                expire_stale(&ledger, &consensus, ttl).await;
            }
        });

        info!("Background tasks started");
    }

    /// Stop background tasks
    pub async fn stop(&self) {
        info!("Stopping FBA node...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Admit a mined and signed transaction to the pending pool
    ///
    /// Returns `false` if the ledger rejects it; resubmitting a pending
    /// transaction is a no-op that returns `true`.
    pub async fn submit_transaction(&self, tx: Transaction) -> bool {
        let hash = tx.hash();
        let admitted = self.ledger.write().await.admit_pending(tx);

        match hash {
            Some(hash) if admitted => debug!("Admitted transaction {} to pending", hash.short_hex()),
            _ => debug!("Transaction refused admission"),
        }
        admitted
    }

    /// Run one voting round on `tx_hash` and evaluate it
    ///
    /// A reject verdict evicts the transaction from the pending pool; its
    /// votes are kept.
    pub async fn simulate_and_evaluate(&self, tx_hash: TxHash) -> Verdict {
        let verdict = {
            let mut consensus = self.consensus.write().await;
            let added = consensus.simulate_vote(tx_hash);
            let verdict = consensus.evaluate(tx_hash);
            debug!("{} new votes on {}: {:?}", added, tx_hash.short_hex(), verdict);
            verdict
        };

        if verdict == Verdict::ConsensusReject {
            if self.ledger.write().await.evict_pending(&tx_hash).is_some() {
                warn!("Transaction {} rejected by consensus, evicted", tx_hash.short_hex());
            }
        }

        verdict
    }

    /// Apply `tx_hash` to the ledger if its cached verdict is accept
    ///
    /// Returns `false` when the verdict is not accept or the transaction is
    /// already confirmed. An accepted transaction that no longer validates
    /// (e.g. another transfer spent the funds first) is evicted from the
    /// pending pool and its votes are forgotten before the error is returned.
    pub async fn finalize_if_accepted(&self, tx_hash: TxHash) -> Result<bool> {
        let mut consensus = self.consensus.write().await;
        let accepted = consensus
            .cached_status(&tx_hash)
            .is_some_and(|s| s.result == Verdict::ConsensusAccept);
        if !accepted {
            return Ok(false);
        }

        let mut ledger = self.ledger.write().await;
        if ledger.is_confirmed(&tx_hash) {
            return Ok(false);
        }

        let tx = ledger
            .get_pending(&tx_hash)
            .cloned()
            .ok_or_else(|| FbaError::not_found(format!("pending transaction {}", tx_hash)))?;

        match ledger.finalize(&tx) {
            Ok(hash) => {
                info!(
                    "Finalized {}: {} -> {} ({})",
                    hash.short_hex(),
                    tx.from_address,
                    tx.to_address,
                    tx.amount
                );
                Ok(true)
            }
            Err(e) => {
                ledger.evict_pending(&tx_hash);
                consensus.forget(&tx_hash);
                warn!(
                    "Accepted transaction {} failed to finalize, evicted: {}",
                    tx_hash.short_hex(),
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Mine a copy of `tx` off the async runtime
    ///
    /// Bounded by the configured iteration count and wall-clock timeout;
    /// `tx` itself is never modified. Dropping the returned future (a client
    /// that disconnects mid-request) also stops the worker.
    pub async fn mine_transaction(&self, tx: &Transaction) -> Result<Transaction> {
        let difficulty = self.config.mining_difficulty;
        let max_iterations = self.config.max_mining_iterations;
        let cancel = CancelOnDrop::new();

        debug!(
            "Mining at difficulty {} (~{} digests expected, limit {})",
            difficulty,
            ProofOfWork::expected_iterations(difficulty),
            max_iterations
        );

        let worker_cancel = cancel.flag();
        let mut candidate = tx.clone();
        let worker = tokio::task::spawn_blocking(move || {
            candidate.mine_bounded(difficulty, max_iterations, &worker_cancel)?;
            Ok::<_, TransactionError>(candidate)
        });

        match tokio::time::timeout(self.config.mining_timeout(), worker).await {
            Ok(Ok(Ok(mined))) => {
                debug!("Mined transaction at difficulty {} with nonce {}", difficulty, mined.nonce());
                Ok(mined)
            }
            Ok(Ok(Err(e))) => {
                warn!("Mining failed: {}", e);
                Err(e.into())
            }
            Ok(Err(e)) => {
                error!("Mining worker failed: {}", e);
                Err(FbaError::internal(format!("mining worker failed: {}", e)))
            }
            Err(_) => {
                cancel.cancel();
                warn!("Mining timed out after {:?}", self.config.mining_timeout());
                Err(FbaError::MiningTimeout(format!(
                    "no nonce found within {}s",
                    self.config.mining_timeout_secs
                )))
            }
        }
    }

    /// Build, mine, sign and submit a transfer, then run consensus on it
    pub async fn send(&self, request: SendRequest) -> Result<SendReceipt> {
        self.expire_pending().await;

        if !is_valid_address(&request.from_address) {
            return Err(FbaError::invalid_address(format!("sender {}", request.from_address)));
        }
        if !is_valid_address(&request.to_address) {
            return Err(FbaError::invalid_address(format!("recipient {}", request.to_address)));
        }
        if request.amount.is_zero() {
            return Err(TransactionError::InvalidAmount(request.amount).into());
        }

        let keypair = KeyPair::from_hex(&request.private_key)?;
        if address_of(&keypair.public_key()) != request.from_address {
            return Err(TransactionError::InvalidSender.into());
        }

        let available = self.ledger.read().await.balance_of(&request.from_address);
        if available < request.amount {
            return Err(TransactionError::InsufficientBalance {
                needed: request.amount,
                available,
            }
            .into());
        }

        let draft = Transaction::new(&request.from_address, &request.to_address, request.amount);
        let mut tx = self.mine_transaction(&draft).await?;
        tx.sign(&keypair)?;
        if !tx.verify(&keypair.public_key()) {
            return Err(TransactionError::InvalidSignature.into());
        }

        let hash = tx.hash().ok_or(TransactionError::MissingHash)?;
        {
            let mut ledger = self.ledger.write().await;
            ledger.check(&tx)?;
            ledger.admit_pending(tx.clone());
        }
        info!(
            "Submitted {}: {} -> {} ({})",
            hash.short_hex(),
            tx.from_address,
            tx.to_address,
            tx.amount
        );

        let verdict = self.simulate_and_evaluate(hash).await;
        let status = match verdict {
            Verdict::ConsensusAccept => {
                self.finalize_if_accepted(hash).await?;
                SendStatus::Confirmed
            }
            Verdict::ConsensusReject => SendStatus::Rejected,
            Verdict::Pending => SendStatus::Pending,
        };

        Ok(SendReceipt {
            hash,
            status,
            transaction: tx,
        })
    }

    /// Issue the faucet amount from genesis to `address`
    pub async fn faucet(&self, address: &str) -> Result<Transaction> {
        if !is_valid_address(address) {
            return Err(FbaError::invalid_address(address));
        }

        let tx = Transaction::genesis_issue(address, self.faucet_amount);
        self.ledger.write().await.issue(&tx)?;

        info!("Faucet issued {} to {}", self.faucet_amount, address);
        Ok(tx)
    }

    /// Create a wallet from a fresh random seed
    pub fn generate_wallet(&self) -> Result<Wallet> {
        let seed = generate_seed();
        self.import_wallet(&seed)
    }

    /// Recreate a wallet from its hex seed
    pub fn import_wallet(&self, seed: &str) -> Result<Wallet> {
        let keys = keypair_from_seed(seed)?;
        let keypair = KeyPair::from_hex(&keys.private_key)?;

        Ok(Wallet {
            seed: seed.to_string(),
            private_key: keys.private_key,
            public_key: keys.public_key,
            address: address_of(&keypair.public_key()),
        })
    }

    pub fn address_info(&self, address: &str) -> Option<AddressInfo> {
        address_info(address)
    }

    /// Balance of a wallet address
    pub async fn balance(&self, address: &str) -> Result<Amount> {
        if !is_valid_address(address) {
            return Err(FbaError::invalid_address(address));
        }
        Ok(self.ledger.read().await.balance_of(address))
    }

    /// Confirmed transactions involving `address`, newest first
    pub async fn history(&self, address: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if !is_valid_address(address) {
            return Err(FbaError::invalid_address(address));
        }

        let ledger = self.ledger.read().await;
        Ok(ledger
            .history(address, limit)
            .into_iter()
            .filter_map(|tx| {
                tx.direction_for(address).map(|direction| HistoryEntry {
                    transaction: tx,
                    direction,
                })
            })
            .collect())
    }

    /// Pending transactions with their latest consensus tally
    pub async fn pending(&self) -> Vec<PendingView> {
        let consensus = self.consensus.read().await;
        let ledger = self.ledger.read().await;

        ledger
            .pending()
            .into_iter()
            .map(|entry| {
                let consensus = entry.tx.hash().and_then(|h| consensus.cached_status(&h));
                PendingView {
                    transaction: entry.tx,
                    admitted_at: entry.admitted_at,
                    consensus,
                }
            })
            .collect()
    }

    /// Most recent confirmed transactions and the total confirmed count
    pub async fn confirmed(&self, limit: usize) -> ConfirmedPage {
        let ledger = self.ledger.read().await;
        ConfirmedPage {
            transactions: ledger.confirmed(limit),
            total: ledger.confirmed_count(),
        }
    }

    /// Consensus tally and raw votes for `tx_hash`
    pub async fn consensus_status(&self, tx_hash: TxHash) -> Result<ConsensusReport> {
        let mut consensus = self.consensus.write().await;
        let snapshot = consensus.status(tx_hash)?;
        Ok(ConsensusReport {
            tx_hash,
            snapshot,
            votes: consensus.node_votes(&tx_hash),
        })
    }

    /// Consensus membership
    pub async fn nodes(&self) -> NodesView {
        let consensus = self.consensus.read().await;
        NodesView {
            nodes: consensus.nodes(),
            quorum_slices: consensus.quorum_slices().clone(),
            threshold: consensus.threshold(),
            rule: consensus.rule(),
        }
    }

    pub async fn stats(&self) -> LedgerStats {
        self.ledger.read().await.stats()
    }

    /// Drop pending transactions older than the configured TTL
    pub async fn expire_pending(&self) -> Vec<TxHash> {
        expire_stale(&self.ledger, &self.consensus, self.config.pending_ttl()).await
    }
}

/// Raises the mining cancel flag when dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn expire_stale(
    ledger: &RwLock<Ledger>,
    consensus: &RwLock<ConsensusEngine>,
    ttl: Duration,
) -> Vec<TxHash> {
    let expired = ledger.write().await.expire_pending(ttl, Timestamp::now());
    if expired.is_empty() {
        return expired;
    }

    let mut consensus = consensus.write().await;
    for hash in &expired {
        consensus.forget(hash);
    }
    info!("Expired {} stale pending transactions", expired.len());
    expired
}

/// Transfer request from a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: Amount,
    pub private_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Confirmed,
    Pending,
    Rejected,
}

/// Outcome of [`FbaNode::send`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    pub hash: TxHash,
    pub status: SendStatus,
    pub transaction: Transaction,
}

/// Wallet key material and address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub seed: String,
    pub private_key: String,
    pub public_key: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub transaction: Transaction,

    #[serde(rename = "type")]
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingView {
    #[serde(flatten)]
    pub transaction: Transaction,

    pub admitted_at: Timestamp,

    /// Latest tally, if a voting round has run
    pub consensus: Option<ConsensusSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedPage {
    pub transactions: Vec<Transaction>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub tx_hash: TxHash,

    #[serde(flatten)]
    pub snapshot: ConsensusSnapshot,

    pub votes: BTreeMap<String, VoteRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesView {
    pub nodes: Vec<ConsensusNode>,
    pub quorum_slices: BTreeMap<String, BTreeSet<String>>,
    pub threshold: u64,
    pub rule: ThresholdRule,
}
