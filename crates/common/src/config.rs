use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Ledger constants
pub mod ledger {
    /// Reserved issuance source, exempt from the debit rule
    pub const GENESIS_ADDRESS: &str = "genesis";

    /// Initial genesis reserve, in whole coins
    pub const GENESIS_BALANCE: u64 = 1_000_000;

    /// Coins handed out per faucet request
    pub const FAUCET_AMOUNT: u64 = 100;

    /// Default number of entries returned by an address history query
    pub const DEFAULT_HISTORY_LIMIT: usize = 10;

    /// Default number of entries returned by a confirmed-log query
    pub const DEFAULT_CONFIRMED_LIMIT: usize = 50;

    /// Maximum time a transaction may sit in the pending pool
    pub const PENDING_TTL_SECS: u64 = 3600;
}

/// Proof-of-work constants
pub mod mining {
    /// Difficulty applied by the send flow (leading hex zeros)
    pub const DEFAULT_DIFFICULTY: u32 = 2;

    /// A 32-byte digest has 64 hex characters
    pub const MAX_DIFFICULTY: u32 = 64;

    /// Upper bound on nonces tried by a single mining job
    pub const MAX_ITERATIONS: u64 = 50_000_000;

    /// Wall-clock bound for a single mining job
    pub const TIMEOUT_SECS: u64 = 10;
}

/// Consensus simulation constants
pub mod consensus {
    /// Probability that a node casts a vote in a simulation round
    pub const PARTICIPATION_PROBABILITY: f64 = 0.9;

    /// Probability that a voting node deviates from the accept default
    pub const DEVIATION_PROBABILITY: f64 = 0.2;
}

/// HTTP API constants
pub mod api {
    /// Default port for the JSON API
    pub const DEFAULT_PORT: u16 = 5000;
}

/// How the consensus engine turns a vote tally into a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Count of votes against floor(2 * node_count / 3)
    #[default]
    NodeCount,

    /// Voting stake against floor(2 * total_stake / 3)
    StakeWeighted,
}

/// A consensus participant as described in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusNodeConfig {
    pub id: String,
    pub name: String,
    pub stake: u64,
    #[serde(default)]
    pub quorum_slice: Vec<String>,
}

impl ConsensusNodeConfig {
    pub fn new(id: &str, name: &str, stake: u64, quorum_slice: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            stake,
            quorum_slice: quorum_slice.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Listen address for the API
    pub listen_addr: String,

    /// Listen port for the API
    pub listen_port: u16,

    /// Initial genesis reserve, in whole coins
    pub genesis_balance: u64,

    /// Coins issued per faucet request
    pub faucet_amount: u64,

    /// Proof-of-work difficulty used by the send flow
    pub mining_difficulty: u32,

    /// Upper bound on nonces tried by one mining job
    pub max_mining_iterations: u64,

    /// Wall-clock bound for one mining job
    pub mining_timeout_secs: u64,

    /// Pending transactions older than this are dropped
    pub pending_ttl_secs: u64,

    pub participation_probability: f64,

    pub deviation_probability: f64,

    #[serde(default)]
    pub threshold_rule: ThresholdRule,

    /// Fixed consensus membership
    pub nodes: Vec<ConsensusNodeConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: api::DEFAULT_PORT,
            genesis_balance: ledger::GENESIS_BALANCE,
            faucet_amount: ledger::FAUCET_AMOUNT,
            mining_difficulty: mining::DEFAULT_DIFFICULTY,
            max_mining_iterations: mining::MAX_ITERATIONS,
            mining_timeout_secs: mining::TIMEOUT_SECS,
            pending_ttl_secs: ledger::PENDING_TTL_SECS,
            participation_probability: consensus::PARTICIPATION_PROBABILITY,
            deviation_probability: consensus::DEVIATION_PROBABILITY,
            threshold_rule: ThresholdRule::NodeCount,
            nodes: default_nodes(),
        }
    }
}

/// The five demo nodes and their quorum slices
pub fn default_nodes() -> Vec<ConsensusNodeConfig> {
    vec![
        ConsensusNodeConfig::new("node_1", "FBA Node 1", 100, &["node_2", "node_3", "node_4"]),
        ConsensusNodeConfig::new("node_2", "FBA Node 2", 80, &["node_1", "node_3", "node_5"]),
        ConsensusNodeConfig::new(
            "node_3",
            "FBA Node 3",
            90,
            &["node_1", "node_2", "node_4", "node_5"],
        ),
        ConsensusNodeConfig::new("node_4", "FBA Node 4", 70, &["node_1", "node_3", "node_5"]),
        ConsensusNodeConfig::new("node_5", "FBA Node 5", 85, &["node_2", "node_3", "node_4"]),
    ]
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_mining_difficulty(mut self, difficulty: u32) -> Self {
        self.mining_difficulty = difficulty;
        self
    }

    pub fn with_mining_limits(mut self, max_iterations: u64, timeout_secs: u64) -> Self {
        self.max_mining_iterations = max_iterations;
        self.mining_timeout_secs = timeout_secs;
        self
    }

    pub fn with_probabilities(mut self, participation: f64, deviation: f64) -> Self {
        self.participation_probability = participation;
        self.deviation_probability = deviation;
        self
    }

    pub fn with_threshold_rule(mut self, rule: ThresholdRule) -> Self {
        self.threshold_rule = rule;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<ConsensusNodeConfig>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_pending_ttl(mut self, secs: u64) -> Self {
        self.pending_ttl_secs = secs;
        self
    }

    pub fn mining_timeout(&self) -> Duration {
        Duration::from_secs(self.mining_timeout_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// Check internal consistency of the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mining_difficulty > mining::MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "mining_difficulty {} exceeds {}",
                self.mining_difficulty,
                mining::MAX_DIFFICULTY
            )));
        }

        for (name, p) in [
            ("participation_probability", self.participation_probability),
            ("deviation_probability", self.deviation_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{} must be within [0, 1]", name)));
            }
        }

        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one consensus node is required".into()));
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate node id {}", node.id)));
            }
        }

        for node in &self.nodes {
            if let Some(unknown) = node.quorum_slice.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "node {} trusts unknown node {}",
                    node.id, unknown
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::FbaError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
