//! Minting candidate enumeration and presigned coinstake import.
//!
//! A secondary subsystem next to ordinary selection: it reads the same
//! coin enumeration but classifies by stake age rather than spendability.
//! Candidates report value, age, and coin-day weight; the stake
//! probability model is deliberately not part of this engine.

use std::collections::BTreeMap;

use beck_core::constants::{COIN, SECS_PER_DAY, STAKE_MIN_AGE_SECS};
use beck_core::destination::Destination;
use beck_core::traits::{ChainView, SolvingProvider};
use beck_core::types::{Hash256, OutPoint, Transaction};
use tracing::debug;

use crate::error::WalletError;
use crate::registry::{Coin, CoinRegistry};

/// Where a minting candidate stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStatus {
    /// Below the minimum stake age.
    Immature,
    /// Eligible for kernel search.
    Mature,
    /// Presigned coinstake awaiting its validity time.
    Imported,
}

/// One mintable output, or one imported coinstake.
#[derive(Debug, Clone)]
pub struct MintCandidate {
    pub outpoint: OutPoint,
    pub destination: Destination,
    /// Value in becks.
    pub value: u64,
    /// Source transaction timestamp.
    pub time: u64,
    /// Age of the output in seconds.
    pub age_secs: u64,
    /// Coin-day weight: whole coins times whole days held.
    pub coin_day_weight: u64,
    pub status: MintStatus,
    /// Seconds until an imported coinstake becomes valid.
    pub due_in_secs: Option<u64>,
    /// Network proof-of-stake difficulty at enumeration time.
    pub difficulty: f64,
}

/// Coin-day weight of a value held for `age_secs`.
fn coin_day_weight(value: u64, age_secs: u64) -> u64 {
    let coin_days = value as u128 * (age_secs / SECS_PER_DAY) as u128 / COIN as u128;
    coin_days.min(u64::MAX as u128) as u64
}

/// Enumerate mintable outputs and imported coinstakes, capped at `count`.
///
/// `coins` must be the wallet's spendable enumeration (immature depths
/// included); imported coinstakes are appended after the wallet's own
/// outputs, in validity-time order.
pub fn list_minting(
    coins: &[Coin],
    coinstakes: &BTreeMap<u64, Transaction>,
    chain: &dyn ChainView,
    count: Option<usize>,
) -> Vec<MintCandidate> {
    let now = chain.adjusted_time();
    let difficulty = chain.pos_difficulty();
    let mut candidates = Vec::new();

    for coin in coins {
        if !coin.spendable() {
            continue;
        }
        if let Some(max) = count {
            if candidates.len() >= max {
                break;
            }
        }
        let age_secs = now.saturating_sub(coin.time);
        let status = if age_secs >= STAKE_MIN_AGE_SECS {
            MintStatus::Mature
        } else {
            MintStatus::Immature
        };
        candidates.push(MintCandidate {
            outpoint: coin.outpoint,
            destination: coin.destination.clone(),
            value: coin.value,
            time: coin.time,
            age_secs,
            coin_day_weight: coin_day_weight(coin.value, age_secs),
            status,
            due_in_secs: None,
            difficulty,
        });
    }

    for (timestamp, tx) in coinstakes {
        if let Some(max) = count {
            if candidates.len() >= max {
                break;
            }
        }
        // Stake output is the second output by coinstake convention.
        let Some(stake_out) = tx.outputs.get(1) else { continue };
        let Ok(txid) = tx.txid() else { continue };
        candidates.push(MintCandidate {
            outpoint: OutPoint::new(txid, 1),
            destination: Destination::from_script(&stake_out.script),
            value: stake_out.value,
            time: tx.time,
            age_secs: now.saturating_sub(tx.time),
            coin_day_weight: 0,
            status: MintStatus::Imported,
            due_in_secs: Some(timestamp.saturating_sub(now)),
            difficulty,
        });
    }

    candidates
}

/// Validate a presigned coinstake for import.
///
/// Returns the validity timestamp and txid on success. The transaction
/// must have coinstake shape, must not already be expired, and the wallet
/// must hold a key for its stake output.
pub fn validate_coinstake_import(
    tx: &Transaction,
    timestamp: Option<u64>,
    now: u64,
    registry: &CoinRegistry,
    solver: &dyn SolvingProvider,
) -> Result<(u64, Hash256), WalletError> {
    if !tx.is_coinstake() {
        return Err(WalletError::InvalidCoinstake(
            "transaction does not have coinstake shape".into(),
        ));
    }
    let timestamp = timestamp.unwrap_or(tx.time);
    if timestamp < now {
        return Err(WalletError::ExpiredCoinstake { timestamp, now });
    }
    let stake_script = &tx.outputs[1].script;
    if !registry.is_mine(stake_script) || !solver.is_solvable(stake_script) {
        return Err(WalletError::CoinstakeKeyMissing);
    }
    let txid = tx
        .txid()
        .map_err(|e| WalletError::InvalidCoinstake(e.to_string()))?;
    debug!(%txid, timestamp, "validated coinstake import");
    Ok((timestamp, txid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Spendability;
    use beck_core::types::{Script, SEQUENCE_FINAL, TxInput, TxOutput};
    use std::collections::HashMap;

    const NOW: u64 = 1_700_000_000;

    struct MockChain;

    impl ChainView for MockChain {
        fn tip_height(&self) -> u64 {
            1000
        }
        fn adjusted_time(&self) -> u64 {
            NOW
        }
        fn is_final(&self, _: &Transaction) -> bool {
            true
        }
        fn find_coins(&self, _: &[OutPoint]) -> HashMap<OutPoint, TxOutput> {
            HashMap::new()
        }
        fn pos_difficulty(&self) -> f64 {
            17.5
        }
    }

    struct AllSolvable;

    impl SolvingProvider for AllSolvable {
        fn is_solvable(&self, _: &Script) -> bool {
            true
        }
        fn infer_descriptor(&self, _: &Script) -> Option<String> {
            None
        }
    }

    fn coin(tag: u8, value: u64, time: u64) -> Coin {
        let destination = Destination::PubkeyHash([tag; 20]);
        Coin {
            outpoint: OutPoint::new(Hash256([tag; 32]), 0),
            value,
            script: destination.to_script(),
            destination,
            depth: 100,
            spendability: Spendability::Spendable,
            solvable: true,
            safe: true,
            trusted: true,
            generated: false,
            immature: false,
            reused: false,
            time,
            label: None,
            descriptor: None,
        }
    }

    fn coinstake(valid_at: u64, stake_value: u64) -> Transaction {
        Transaction {
            version: 1,
            time: valid_at,
            inputs: vec![TxInput::unsigned(
                OutPoint::new(Hash256([7; 32]), 0),
                SEQUENCE_FINAL,
            )],
            outputs: vec![
                TxOutput::empty(),
                TxOutput {
                    value: stake_value,
                    script: Destination::PubkeyHash([7; 20]).to_script(),
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn old_coin_is_mature() {
        let coins = vec![coin(1, 100 * COIN, NOW - STAKE_MIN_AGE_SECS)];
        let list = list_minting(&coins, &BTreeMap::new(), &MockChain, None);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, MintStatus::Mature);
        assert_eq!(list[0].age_secs, STAKE_MIN_AGE_SECS);
        assert_eq!(list[0].difficulty, 17.5);
    }

    #[test]
    fn young_coin_is_immature() {
        let coins = vec![coin(1, 100 * COIN, NOW - SECS_PER_DAY)];
        let list = list_minting(&coins, &BTreeMap::new(), &MockChain, None);
        assert_eq!(list[0].status, MintStatus::Immature);
    }

    #[test]
    fn coin_day_weight_counts_whole_days() {
        // 100 coins held 40 days.
        let coins = vec![coin(1, 100 * COIN, NOW - 40 * SECS_PER_DAY)];
        let list = list_minting(&coins, &BTreeMap::new(), &MockChain, None);
        assert_eq!(list[0].coin_day_weight, 4000);
    }

    #[test]
    fn count_caps_wallet_outputs() {
        let coins: Vec<Coin> = (1..=5u8)
            .map(|t| coin(t, COIN, NOW - STAKE_MIN_AGE_SECS))
            .collect();
        let list = list_minting(&coins, &BTreeMap::new(), &MockChain, Some(2));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn count_caps_imported_coinstakes_too() {
        let coins = vec![coin(1, COIN, NOW - STAKE_MIN_AGE_SECS)];
        let mut stakes = BTreeMap::new();
        stakes.insert(NOW + 600, coinstake(NOW + 600, 50 * COIN));
        stakes.insert(NOW + 1200, coinstake(NOW + 1200, 60 * COIN));
        let list = list_minting(&coins, &stakes, &MockChain, Some(2));
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].status, MintStatus::Imported);
    }

    #[test]
    fn watch_only_coins_not_mintable() {
        let mut c = coin(1, COIN, NOW - STAKE_MIN_AGE_SECS);
        c.spendability = Spendability::WatchOnly;
        assert!(list_minting(&[c], &BTreeMap::new(), &MockChain, None).is_empty());
    }

    #[test]
    fn imported_coinstakes_appended() {
        let mut stakes = BTreeMap::new();
        stakes.insert(NOW + 600, coinstake(NOW + 600, 50 * COIN));
        let list = list_minting(&[], &stakes, &MockChain, None);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, MintStatus::Imported);
        assert_eq!(list[0].value, 50 * COIN);
        assert_eq!(list[0].due_in_secs, Some(600));
    }

    // --- import validation ---

    #[test]
    fn valid_import_accepted() {
        let mut registry = CoinRegistry::new();
        registry.register_script(Destination::PubkeyHash([7; 20]).to_script());
        let tx = coinstake(NOW + 600, 50 * COIN);
        let (ts, txid) =
            validate_coinstake_import(&tx, None, NOW, &registry, &AllSolvable).unwrap();
        assert_eq!(ts, NOW + 600);
        assert_eq!(txid, tx.txid().unwrap());
    }

    #[test]
    fn explicit_timestamp_wins() {
        let mut registry = CoinRegistry::new();
        registry.register_script(Destination::PubkeyHash([7; 20]).to_script());
        let tx = coinstake(NOW + 600, 50 * COIN);
        let (ts, _) =
            validate_coinstake_import(&tx, Some(NOW + 1200), NOW, &registry, &AllSolvable)
                .unwrap();
        assert_eq!(ts, NOW + 1200);
    }

    #[test]
    fn expired_import_rejected() {
        let mut registry = CoinRegistry::new();
        registry.register_script(Destination::PubkeyHash([7; 20]).to_script());
        let tx = coinstake(NOW - 1, 50 * COIN);
        let err =
            validate_coinstake_import(&tx, None, NOW, &registry, &AllSolvable).unwrap_err();
        assert_eq!(err, WalletError::ExpiredCoinstake { timestamp: NOW - 1, now: NOW });
    }

    #[test]
    fn import_without_key_rejected() {
        let registry = CoinRegistry::new();
        let tx = coinstake(NOW + 600, 50 * COIN);
        let err =
            validate_coinstake_import(&tx, None, NOW, &registry, &AllSolvable).unwrap_err();
        assert_eq!(err, WalletError::CoinstakeKeyMissing);
    }

    #[test]
    fn non_coinstake_rejected() {
        let registry = CoinRegistry::new();
        let tx = Transaction {
            version: 1,
            time: NOW,
            inputs: vec![TxInput::unsigned(OutPoint::null(), SEQUENCE_FINAL)],
            outputs: vec![TxOutput { value: COIN, script: Script(vec![1]) }],
            lock_time: 0,
        };
        let err =
            validate_coinstake_import(&tx, None, NOW, &registry, &AllSolvable).unwrap_err();
        assert!(matches!(err, WalletError::InvalidCoinstake(_)));
    }
}
