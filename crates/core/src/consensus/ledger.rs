use super::transaction::{Transaction, TransactionError, TxSignature};
use fba_common::{is_genesis, ledger::GENESIS_ADDRESS, Amount, Timestamp, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A transaction waiting for a consensus verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub tx: Transaction,

    /// When the transaction entered the pending pool
    pub admitted_at: Timestamp,
}

/// Ledger that tracks account balances and the confirmed/pending logs
///
/// Mutating methods take `&mut self`; callers share the ledger behind a lock
/// so that a balance read never observes half of a finalization.
#[derive(Debug)]
pub struct Ledger {
    /// Account balances (address -> amount)
    balances: HashMap<String, Amount>,

    /// Finalized transactions in confirmation order
    confirmed: Vec<Transaction>,

    /// Hashes of `confirmed`, for replay protection
    confirmed_hashes: HashSet<TxHash>,

    /// Admitted transactions awaiting consensus
    pending: HashMap<TxHash, PendingEntry>,
}

impl Ledger {
    /// Create a ledger whose genesis reserve holds `genesis_balance`
    pub fn new(genesis_balance: Amount) -> Self {
        let mut balances = HashMap::new();
        balances.insert(GENESIS_ADDRESS.to_string(), genesis_balance);

        Self {
            balances,
            confirmed: Vec::new(),
            confirmed_hashes: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Get balance for an address, zero if never seen
    pub fn balance_of(&self, address: &str) -> Amount {
        self.balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    /// Check a transaction against the current balances
    ///
    /// Signature cryptography is not checked here; callers verify before
    /// admission.
    pub fn check(&self, tx: &Transaction) -> Result<(), TransactionError> {
        if tx.amount.is_zero() {
            return Err(TransactionError::InvalidAmount(tx.amount));
        }

        let hash = tx.hash().ok_or(TransactionError::MissingHash)?;
        if !tx.is_hash_consistent() {
            return Err(TransactionError::StaleHash);
        }
        if tx.signature().is_none() {
            return Err(TransactionError::MissingSignature);
        }

        if self.confirmed_hashes.contains(&hash) {
            return Err(TransactionError::AlreadyConfirmed(hash));
        }

        if !tx.is_genesis_issue() {
            let available = self.balance_of(&tx.from_address);
            if available < tx.amount {
                return Err(TransactionError::InsufficientBalance {
                    needed: tx.amount,
                    available,
                });
            }
        }

        Ok(())
    }

    /// Boolean form of [`Ledger::check`]
    pub fn validate(&self, tx: &Transaction) -> bool {
        self.check(tx).is_ok()
    }

    /// Add a valid transaction to the pending pool
    ///
    /// Re-admitting a hash that is already pending keeps the original entry.
    pub fn admit_pending(&mut self, tx: Transaction) -> bool {
        self.admit_pending_at(tx, Timestamp::now())
    }

    pub fn admit_pending_at(&mut self, tx: Transaction, now: Timestamp) -> bool {
        if !self.validate(&tx) {
            return false;
        }

        let Some(hash) = tx.hash() else {
            return false;
        };

        self.pending.entry(hash).or_insert(PendingEntry {
            tx,
            admitted_at: now,
        });
        true
    }

    /// Apply a transaction: debit, credit, append to the confirmed log and
    /// drop it from the pending pool
    ///
    /// Transfers must have been admitted to the pending pool first; only
    /// genesis issuance is applied directly. New balances are computed before
    /// anything is written, so an error leaves the ledger unchanged.
    pub fn finalize(&mut self, tx: &Transaction) -> Result<TxHash, TransactionError> {
        self.check(tx)?;
        let hash = tx.hash().ok_or(TransactionError::MissingHash)?;
        if !tx.is_genesis_issue() && !self.pending.contains_key(&hash) {
            return Err(TransactionError::NotPending(hash));
        }

        let mut updates: Vec<(String, Amount)> = Vec::with_capacity(2);

        let mut recipient_base = self.balance_of(&tx.to_address);
        if !tx.is_genesis_issue() {
            let debited = self
                .balance_of(&tx.from_address)
                .checked_sub(tx.amount)
                .ok_or(TransactionError::InsufficientBalance {
                    needed: tx.amount,
                    available: self.balance_of(&tx.from_address),
                })?;
            if tx.from_address == tx.to_address {
                recipient_base = debited;
            }
            updates.push((tx.from_address.clone(), debited));
        }

        let credited = recipient_base
            .checked_add(tx.amount)
            .ok_or(TransactionError::BalanceOverflow)?;
        updates.push((tx.to_address.clone(), credited));

        for (address, balance) in updates {
            self.balances.insert(address, balance);
        }
        self.confirmed.push(tx.clone());
        self.confirmed_hashes.insert(hash);
        self.pending.remove(&hash);

        Ok(hash)
    }

    /// Apply genesis-sourced issuance directly, without a pending stage
    pub fn issue(&mut self, tx: &Transaction) -> Result<TxHash, TransactionError> {
        if !tx.is_genesis_issue() {
            return Err(TransactionError::InvalidSender);
        }
        if tx.signature() != Some(&TxSignature::Genesis) {
            return Err(TransactionError::InvalidSignature);
        }
        self.finalize(tx)
    }

    /// Confirmed transactions involving `address`, newest first
    pub fn history(&self, address: &str, limit: usize) -> Vec<Transaction> {
        let mut matching: Vec<&Transaction> = self
            .confirmed
            .iter()
            .rev()
            .filter(|tx| tx.from_address == address || tx.to_address == address)
            .collect();

        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.into_iter().take(limit).cloned().collect()
    }

    /// All confirmed transactions, newest first
    pub fn confirmed(&self, limit: usize) -> Vec<Transaction> {
        let mut all: Vec<&Transaction> = self.confirmed.iter().rev().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.into_iter().take(limit).cloned().collect()
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_confirmed(&self, hash: &TxHash) -> bool {
        self.confirmed_hashes.contains(hash)
    }

    /// Pending pool, oldest admission first
    pub fn pending(&self) -> Vec<PendingEntry> {
        let mut entries: Vec<PendingEntry> = self.pending.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.admitted_at
                .cmp(&b.admitted_at)
                .then(a.tx.timestamp.cmp(&b.tx.timestamp))
        });
        entries
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn get_pending(&self, hash: &TxHash) -> Option<&Transaction> {
        self.pending.get(hash).map(|entry| &entry.tx)
    }

    /// Drop a transaction from the pending pool
    pub fn evict_pending(&mut self, hash: &TxHash) -> Option<Transaction> {
        self.pending.remove(hash).map(|entry| entry.tx)
    }

    /// Drop pending transactions admitted more than `max_age` before `now`
    pub fn expire_pending(&mut self, max_age: Duration, now: Timestamp) -> Vec<TxHash> {
        let expired: Vec<TxHash> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.admitted_at.elapsed_at(now) > max_age)
            .map(|(hash, _)| *hash)
            .collect();

        for hash in &expired {
            self.pending.remove(hash);
        }

        expired
    }

    /// Get ledger statistics
    pub fn stats(&self) -> LedgerStats {
        let total_supply = self
            .balances
            .values()
            .fold(Amount::ZERO, |acc, &b| acc.saturating_add(b));

        let circulating_supply = self
            .balances
            .iter()
            .filter(|(address, _)| !is_genesis(address))
            .fold(Amount::ZERO, |acc, (_, &b)| acc.saturating_add(b));

        LedgerStats {
            total_transactions: self.confirmed.len(),
            pending_count: self.pending.len(),
            total_supply,
            circulating_supply,
            active_addresses: self.balances.values().filter(|b| !b.is_zero()).count(),
            total_addresses: self.balances.len(),
        }
    }

}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(Amount::from_coins(fba_common::ledger::GENESIS_BALANCE).unwrap_or(Amount::ZERO))
    }
}

/// Ledger statistics
///
/// `total_supply` includes the genesis reserve; `circulating_supply` does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_transactions: usize,
    pub pending_count: usize,
    pub total_supply: Amount,
    pub circulating_supply: Amount,
    pub active_addresses: usize,
    pub total_addresses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{address_of, KeyPair};

    fn coins(n: u64) -> Amount {
        Amount::from_coins(n).unwrap()
    }

    fn new_address() -> (KeyPair, String) {
        let keypair = KeyPair::generate();
        let address = address_of(&keypair.public_key());
        (keypair, address)
    }

    fn signed_transfer(keypair: &KeyPair, from: &str, to: &str, amount: u64, ts: u64) -> Transaction {
        let mut tx = Transaction::with_timestamp(from, to, coins(amount), Timestamp::from_secs(ts));
        tx.seal();
        tx.sign(keypair).unwrap();
        tx
    }

    fn funded_ledger(address: &str, amount: u64) -> Ledger {
        let mut ledger = Ledger::default();
        ledger
            .issue(&Transaction::genesis_issue(address, coins(amount)))
            .unwrap();
        ledger
    }

    #[test]
    fn test_ledger_creation() {
        let ledger = Ledger::default();

        assert_eq!(ledger.balance_of(GENESIS_ADDRESS), coins(1_000_000));
        assert_eq!(ledger.balance_of("fba_unknown"), Amount::ZERO);
        assert_eq!(ledger.confirmed_count(), 0);
    }

    #[test]
    fn test_faucet_scenario() {
        let (_, alice) = new_address();
        let ledger = funded_ledger(&alice, 100);

        assert_eq!(ledger.balance_of(&alice), coins(100));

        let history = ledger.history(&alice, 10);
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].direction_for(&alice),
            Some(crate::consensus::Direction::Received)
        );

        // Genesis is an issuance source and is never debited
        assert_eq!(ledger.balance_of(GENESIS_ADDRESS), coins(1_000_000));
    }

    #[test]
    fn test_transfer_conserves_balances() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        let before = ledger.stats().circulating_supply;

        let tx = signed_transfer(&kp1, &alice, &bob, 300, 10);
        assert!(ledger.admit_pending(tx.clone()));
        ledger.finalize(&tx).unwrap();

        assert_eq!(ledger.balance_of(&alice), coins(700));
        assert_eq!(ledger.balance_of(&bob), coins(300));
        assert_eq!(ledger.stats().circulating_supply, before);
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn test_self_transfer() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 50);

        let tx = signed_transfer(&kp1, &alice, &alice, 20, 10);
        assert!(ledger.admit_pending(tx.clone()));
        ledger.finalize(&tx).unwrap();

        assert_eq!(ledger.balance_of(&alice), coins(50));
    }

    #[test]
    fn test_insufficient_balance() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 100);

        let tx = signed_transfer(&kp1, &alice, &bob, 500, 10);
        assert!(!ledger.validate(&tx));
        assert!(!ledger.admit_pending(tx.clone()));
        assert_eq!(ledger.pending_count(), 0);

        let result = ledger.finalize(&tx);
        assert!(matches!(
            result,
            Err(TransactionError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance_of(&alice), coins(100));
        assert_eq!(ledger.confirmed_count(), 1);
    }

    #[test]
    fn test_validation_rules() {
        let (kp1, alice) = new_address();
        let ledger = funded_ledger(&alice, 100);

        let mut zero = Transaction::new(&alice, "fba_b", Amount::ZERO);
        zero.seal();
        zero.sign(&kp1).unwrap();
        assert_eq!(
            ledger.check(&zero),
            Err(TransactionError::InvalidAmount(Amount::ZERO))
        );

        let unsealed = Transaction::new(&alice, "fba_b", coins(1));
        assert_eq!(ledger.check(&unsealed), Err(TransactionError::MissingHash));

        let mut unsigned = Transaction::new(&alice, "fba_b", coins(1));
        unsigned.seal();
        assert_eq!(ledger.check(&unsigned), Err(TransactionError::MissingSignature));
    }

    #[test]
    fn test_edited_fields_invalidate_hash() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        let mut tx = signed_transfer(&kp1, &alice, &bob, 1, 10);
        tx.amount = coins(900);

        assert_eq!(ledger.check(&tx), Err(TransactionError::StaleHash));
        assert!(!ledger.admit_pending(tx.clone()));
        assert_eq!(ledger.finalize(&tx), Err(TransactionError::StaleHash));
        assert_eq!(ledger.balance_of(&alice), coins(1000));
        assert_eq!(ledger.balance_of(&bob), Amount::ZERO);

        // Retargeting the recipient is caught the same way
        let mut redirected = signed_transfer(&kp1, &alice, &bob, 1, 11);
        redirected.to_address = "fba_mallory".to_string();
        assert!(!ledger.validate(&redirected));
    }

    #[test]
    fn test_finalize_requires_pending() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 100);

        let tx = signed_transfer(&kp1, &alice, &bob, 10, 10);
        let hash = tx.hash().unwrap();
        assert_eq!(ledger.finalize(&tx), Err(TransactionError::NotPending(hash)));
        assert_eq!(ledger.balance_of(&alice), coins(100));
        assert_eq!(ledger.confirmed_count(), 1);

        assert!(ledger.admit_pending(tx.clone()));
        assert_eq!(ledger.finalize(&tx), Ok(hash));
        assert_eq!(ledger.balance_of(&bob), coins(10));
    }

    #[test]
    fn test_admission_idempotence() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 100);

        let tx = signed_transfer(&kp1, &alice, "fba_b", 10, 10);
        assert!(ledger.admit_pending_at(tx.clone(), Timestamp::from_secs(100)));
        let after_first = ledger.pending();

        assert!(ledger.admit_pending_at(tx, Timestamp::from_secs(200)));
        assert_eq!(ledger.pending(), after_first);
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_replay_prevention() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        let tx = signed_transfer(&kp1, &alice, "fba_b", 100, 10);
        assert!(ledger.admit_pending(tx.clone()));
        ledger.finalize(&tx).unwrap();

        let result = ledger.finalize(&tx);
        assert!(matches!(result, Err(TransactionError::AlreadyConfirmed(_))));
        assert!(!ledger.admit_pending(tx));
        assert_eq!(ledger.balance_of(&alice), coins(900));
    }

    #[test]
    fn test_issue_requires_genesis_sentinel() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 10);

        let tx = signed_transfer(&kp1, &alice, "fba_b", 1, 10);
        assert_eq!(ledger.issue(&tx), Err(TransactionError::InvalidSender));

        let mut fake = Transaction::new(GENESIS_ADDRESS, "fba_b", coins(1));
        fake.seal();
        fake.sign(&kp1).unwrap();
        assert_eq!(ledger.issue(&fake), Err(TransactionError::InvalidSignature));
    }

    #[test]
    fn test_history_ordering_and_limit() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        for ts in [30, 10, 50, 20, 40] {
            let tx = signed_transfer(&kp1, &alice, &bob, 1, ts);
            assert!(ledger.admit_pending(tx.clone()));
            ledger.finalize(&tx).unwrap();
        }

        let history = ledger.history(&bob, 3);
        let stamps: Vec<u64> = history.iter().map(|tx| tx.timestamp.as_secs()).collect();
        assert_eq!(stamps, vec![50, 40, 30]);

        // Alice also has the faucet credit
        assert_eq!(ledger.history(&alice, 100).len(), 6);
        assert!(ledger.history("fba_nobody", 10).is_empty());
        assert!(ledger.history(&alice, 0).is_empty());
    }

    #[test]
    fn test_confirmed_listing() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        for ts in [1, 3, 2] {
            let tx = signed_transfer(&kp1, &alice, "fba_b", 1, ts);
            assert!(ledger.admit_pending(tx.clone()));
            ledger.finalize(&tx).unwrap();
        }

        let listed = ledger.confirmed(2);
        assert_eq!(listed.len(), 2);
        assert!(listed[0].timestamp >= listed[1].timestamp);
        assert_eq!(ledger.confirmed_count(), 4);
    }

    #[test]
    fn test_evict_and_expire_pending() {
        let (kp1, alice) = new_address();
        let mut ledger = funded_ledger(&alice, 1000);

        let old = signed_transfer(&kp1, &alice, "fba_b", 1, 1);
        let fresh = signed_transfer(&kp1, &alice, "fba_b", 2, 2);
        let doomed = signed_transfer(&kp1, &alice, "fba_b", 3, 3);

        assert!(ledger.admit_pending_at(old.clone(), Timestamp::from_secs(1_000)));
        assert!(ledger.admit_pending_at(fresh.clone(), Timestamp::from_secs(4_000)));
        assert!(ledger.admit_pending_at(doomed.clone(), Timestamp::from_secs(4_000)));

        let evicted = ledger.evict_pending(&doomed.hash().unwrap());
        assert_eq!(evicted, Some(doomed));

        let expired = ledger.expire_pending(Duration::from_secs(3600), Timestamp::from_secs(5_000));
        assert_eq!(expired, vec![old.hash().unwrap()]);
        assert_eq!(ledger.pending_count(), 1);
        assert!(ledger.get_pending(&fresh.hash().unwrap()).is_some());
    }

    #[test]
    fn test_stats() {
        let (kp1, alice) = new_address();
        let (_, bob) = new_address();
        let mut ledger = funded_ledger(&alice, 100);

        let spend = signed_transfer(&kp1, &alice, &bob, 100, 10);
        assert!(ledger.admit_pending(spend.clone()));
        ledger.finalize(&spend).unwrap();
        let overdraft = signed_transfer(&kp1, &alice, &bob, 1, 11);
        assert!(!ledger.admit_pending(overdraft));

        let stats = ledger.stats();
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_supply, coins(1_000_100));
        assert_eq!(stats.circulating_supply, coins(100));
        // genesis and bob hold funds; alice is at zero
        assert_eq!(stats.active_addresses, 2);
        assert_eq!(stats.total_addresses, 3);
    }
}
