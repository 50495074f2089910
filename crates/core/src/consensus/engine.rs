use fba_common::{NodeConfig, ThresholdRule, Timestamp, TxHash};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A trusted participant in the federated vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusNode {
    pub id: String,
    pub name: String,
    pub stake: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Accept,
    Reject,
}

/// A single node's vote on a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote: Vote,
    pub timestamp: Timestamp,
    pub node_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pending,
    ConsensusAccept,
    ConsensusReject,
}

/// Tally of the votes on one transaction at evaluation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSnapshot {
    pub result: Verdict,
    pub accept_votes: usize,
    pub reject_votes: usize,
    pub total_votes: usize,
    pub threshold: u64,
    pub rule: ThresholdRule,
    pub accept_stake: u64,
    pub reject_stake: u64,
    pub timestamp: Timestamp,
}

/// Simulated federated Byzantine agreement among a fixed node set
///
/// Quorum slices are tracked but the verdict uses a plain threshold over the
/// whole node set (see [`ThresholdRule`]).
#[derive(Debug)]
pub struct ConsensusEngine {
    nodes: BTreeMap<String, ConsensusNode>,

    /// node_id -> trusted node_ids
    quorum_slices: BTreeMap<String, BTreeSet<String>>,

    /// tx hash -> node_id -> vote
    votes: HashMap<TxHash, BTreeMap<String, VoteRecord>>,

    /// tx hash -> last evaluated tally
    results: HashMap<TxHash, ConsensusSnapshot>,

    participation_probability: f64,

    deviation_probability: f64,

    rule: ThresholdRule,
}

impl ConsensusEngine {
    /// Create an engine with no nodes
    pub fn new(participation_probability: f64, deviation_probability: f64, rule: ThresholdRule) -> Self {
        Self {
            nodes: BTreeMap::new(),
            quorum_slices: BTreeMap::new(),
            votes: HashMap::new(),
            results: HashMap::new(),
            participation_probability: probability(participation_probability),
            deviation_probability: probability(deviation_probability),
            rule,
        }
    }

    /// Create an engine with the membership and probabilities from `config`
    pub fn from_config(config: &NodeConfig) -> Result<Self, ConsensusError> {
        let mut engine = Self::new(
            config.participation_probability,
            config.deviation_probability,
            config.threshold_rule,
        );

        for node in &config.nodes {
            engine.register_node(&node.id, &node.name, node.stake)?;
        }
        for node in &config.nodes {
            engine.set_quorum_slice(&node.id, node.quorum_slice.iter().cloned())?;
        }

        Ok(engine)
    }

    /// Add a node to the membership
    pub fn register_node(&mut self, id: &str, name: &str, stake: u64) -> Result<(), ConsensusError> {
        if self.nodes.contains_key(id) {
            return Err(ConsensusError::DuplicateNode(id.to_string()));
        }

        self.nodes.insert(
            id.to_string(),
            ConsensusNode {
                id: id.to_string(),
                name: name.to_string(),
                stake,
            },
        );
        self.quorum_slices.entry(id.to_string()).or_default();
        Ok(())
    }

    /// Replace a node's quorum slice; every member must be registered
    pub fn set_quorum_slice<I>(&mut self, id: &str, slice: I) -> Result<(), ConsensusError>
    where
        I: IntoIterator<Item = String>,
    {
        if !self.nodes.contains_key(id) {
            return Err(ConsensusError::UnknownNode(id.to_string()));
        }

        let slice: BTreeSet<String> = slice.into_iter().collect();
        if let Some(unknown) = slice.iter().find(|member| !self.nodes.contains_key(*member)) {
            return Err(ConsensusError::UnknownNode(unknown.clone()));
        }

        self.quorum_slices.insert(id.to_string(), slice);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> Vec<ConsensusNode> {
        self.nodes.values().cloned().collect()
    }

    pub fn get_node(&self, id: &str) -> Option<&ConsensusNode> {
        self.nodes.get(id)
    }

    pub fn quorum_slices(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.quorum_slices
    }

    pub fn rule(&self) -> ThresholdRule {
        self.rule
    }

    pub fn total_stake(&self) -> u64 {
        self.nodes.values().map(|n| n.stake).sum()
    }

    /// Minimum tally for a terminal verdict: max(1, floor(2n/3))
    ///
    /// `n` is the node count or the total stake depending on the rule. This
    /// departs from a plain floor(2n/3) when n <= 1: floor gives 0 there, so a
    /// one-node (or one-stake) federation would accept with no votes at all.
    /// The clamp makes it need one vote instead. For n >= 2 the two agree.
    pub fn threshold(&self) -> u64 {
        let base = match self.rule {
            ThresholdRule::NodeCount => self.nodes.len() as u64,
            ThresholdRule::StakeWeighted => self.total_stake(),
        };
        (base.saturating_mul(2) / 3).max(1)
    }

    /// Run one simulated voting round using the thread RNG
    pub fn simulate_vote(&mut self, tx_hash: TxHash) -> usize {
        self.simulate_vote_with(tx_hash, &mut rand::thread_rng())
    }

    /// Run one simulated voting round
    ///
    /// Each node that has not yet voted on `tx_hash` votes with the
    /// participation probability; a voting node deviates from "accept" with
    /// the deviation probability, and a deviating node picks either side.
    /// Returns the number of votes added.
    pub fn simulate_vote_with<R: Rng + ?Sized>(&mut self, tx_hash: TxHash, rng: &mut R) -> usize {
        let now = Timestamp::now();
        let ballots = self.votes.entry(tx_hash).or_default();
        let mut added = 0;

        for node in self.nodes.values() {
            if ballots.contains_key(&node.id) {
                continue;
            }

            if !rng.gen_bool(self.participation_probability) {
                continue;
            }

            let vote = if rng.gen_bool(self.deviation_probability) {
                if rng.gen_bool(0.5) {
                    Vote::Accept
                } else {
                    Vote::Reject
                }
            } else {
                Vote::Accept
            };

            ballots.insert(
                node.id.clone(),
                VoteRecord {
                    vote,
                    timestamp: now,
                    node_name: node.name.clone(),
                },
            );
            added += 1;
        }

        added
    }

    /// Record a single node's vote
    ///
    /// Returns `false` if the node had already voted; its first vote stands.
    pub fn record_vote(&mut self, tx_hash: TxHash, node_id: &str, vote: Vote) -> Result<bool, ConsensusError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| ConsensusError::UnknownNode(node_id.to_string()))?;

        let ballots = self.votes.entry(tx_hash).or_default();
        if ballots.contains_key(node_id) {
            return Ok(false);
        }

        ballots.insert(
            node_id.to_string(),
            VoteRecord {
                vote,
                timestamp: Timestamp::now(),
                node_name: node.name.clone(),
            },
        );
        Ok(true)
    }

    /// Count the votes on `tx_hash` and cache the tally
    ///
    /// A hash nobody voted on evaluates to `Pending` and is not cached.
    pub fn evaluate(&mut self, tx_hash: TxHash) -> Verdict {
        match self.tally(&tx_hash) {
            Some(snapshot) => {
                let verdict = snapshot.result;
                self.results.insert(tx_hash, snapshot);
                verdict
            }
            None => Verdict::Pending,
        }
    }

    fn tally(&self, tx_hash: &TxHash) -> Option<ConsensusSnapshot> {
        let ballots = self.votes.get(tx_hash).filter(|b| !b.is_empty())?;

        let mut accept_votes = 0;
        let mut reject_votes = 0;
        let mut accept_stake = 0u64;
        let mut reject_stake = 0u64;

        for (node_id, record) in ballots {
            let stake = self.nodes.get(node_id).map(|n| n.stake).unwrap_or(0);
            match record.vote {
                Vote::Accept => {
                    accept_votes += 1;
                    accept_stake = accept_stake.saturating_add(stake);
                }
                Vote::Reject => {
                    reject_votes += 1;
                    reject_stake = reject_stake.saturating_add(stake);
                }
            }
        }

        let threshold = self.threshold();
        let (accept_weight, reject_weight) = match self.rule {
            ThresholdRule::NodeCount => (accept_votes as u64, reject_votes as u64),
            ThresholdRule::StakeWeighted => (accept_stake, reject_stake),
        };

        let result = if accept_weight >= threshold {
            Verdict::ConsensusAccept
        } else if reject_weight >= threshold {
            Verdict::ConsensusReject
        } else {
            Verdict::Pending
        };

        Some(ConsensusSnapshot {
            result,
            accept_votes,
            reject_votes,
            total_votes: ballots.len(),
            threshold,
            rule: self.rule,
            accept_stake,
            reject_stake,
            timestamp: Timestamp::now(),
        })
    }

    /// Cached tally, computing one if votes exist but none was cached
    pub fn status(&mut self, tx_hash: TxHash) -> Result<ConsensusSnapshot, ConsensusError> {
        if let Some(snapshot) = self.results.get(&tx_hash) {
            return Ok(snapshot.clone());
        }

        let snapshot = self.tally(&tx_hash).ok_or(ConsensusError::NotFound(tx_hash))?;
        self.results.insert(tx_hash, snapshot.clone());
        Ok(snapshot)
    }

    /// Cached tally without computing one
    pub fn cached_status(&self, tx_hash: &TxHash) -> Option<ConsensusSnapshot> {
        self.results.get(tx_hash).cloned()
    }

    /// Raw per-node votes on `tx_hash`
    pub fn node_votes(&self, tx_hash: &TxHash) -> BTreeMap<String, VoteRecord> {
        self.votes.get(tx_hash).cloned().unwrap_or_default()
    }

    pub fn has_votes(&self, tx_hash: &TxHash) -> bool {
        self.votes.get(tx_hash).is_some_and(|b| !b.is_empty())
    }

    /// Drop votes and tally for `tx_hash`
    pub fn forget(&mut self, tx_hash: &TxHash) {
        self.votes.remove(tx_hash);
        self.results.remove(tx_hash);
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Consensus engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("Unknown consensus node: {0}")]
    UnknownNode(String),

    #[error("Consensus node already registered: {0}")]
    DuplicateNode(String),

    #[error("No votes recorded for transaction {0}")]
    NotFound(TxHash),
}
