//! Balance aggregation over enumerated coins.
//!
//! Buckets are assigned exhaustively: every coin lands in exactly one of
//! immature / trusted / untrusted-pending, so the per-ownership bucket sums
//! always equal the unconstrained total. The reused bucket is derived as a
//! complement of two subtotals accumulated in the same pass, never by
//! independent accumulation.

use serde::{Deserialize, Serialize};

use crate::registry::Coin;

/// Bucketed totals for one ownership class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balances {
    /// Coins from trusted transactions at or above the depth cutoff.
    pub trusted: u64,
    /// Everything else that is not immature.
    pub untrusted_pending: u64,
    /// Generated coins short of maturity.
    pub immature: u64,
}

impl Balances {
    /// Sum of all buckets.
    pub fn total(&self) -> u64 {
        self.trusted + self.untrusted_pending + self.immature
    }
}

/// Point-in-time balance aggregation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Coins the wallet can spend.
    pub mine: Balances,
    /// Tracked coins without spending keys.
    pub watch_only: Balances,
    /// Balance sitting on reused addresses; present only when avoid-reuse
    /// is active. Always `total − non-reused total` of the spendable
    /// trusted+pending buckets.
    pub used: Option<u64>,
}

/// Aggregate a coin enumeration into a balance snapshot.
///
/// `coins` must be an unconstrained enumeration (immature and unsafe coins
/// included) for the decomposition guarantee to hold.
pub fn compute_balance(coins: &[Coin], min_depth: u64, avoid_reuse: bool) -> BalanceSnapshot {
    let mut mine = Balances::default();
    let mut watch_only = Balances::default();
    // Spendable trusted+pending subtotals for the used-balance complement.
    let mut mine_full: u64 = 0;
    let mut mine_non_reused: u64 = 0;

    for coin in coins {
        let buckets = if coin.spendable() { &mut mine } else { &mut watch_only };
        if coin.immature {
            buckets.immature += coin.value;
            continue;
        }
        if coin.trusted && coin.depth >= min_depth {
            buckets.trusted += coin.value;
        } else {
            buckets.untrusted_pending += coin.value;
        }
        if coin.spendable() {
            mine_full += coin.value;
            if !coin.reused {
                mine_non_reused += coin.value;
            }
        }
    }

    BalanceSnapshot {
        mine,
        watch_only,
        used: avoid_reuse.then(|| mine_full - mine_non_reused),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Spendability;
    use beck_core::constants::COIN;
    use beck_core::destination::Destination;
    use beck_core::types::{Hash256, OutPoint};

    fn coin(tag: u8, value: u64) -> Coin {
        let destination = Destination::PubkeyHash([tag; 20]);
        Coin {
            outpoint: OutPoint::new(Hash256([tag; 32]), 0),
            value,
            script: destination.to_script(),
            destination,
            depth: 10,
            spendability: Spendability::Spendable,
            solvable: true,
            safe: true,
            trusted: true,
            generated: false,
            immature: false,
            reused: false,
            time: 0,
            label: None,
            descriptor: None,
        }
    }

    #[test]
    fn empty_wallet_is_zero() {
        let snapshot = compute_balance(&[], 1, false);
        assert_eq!(snapshot.mine.total(), 0);
        assert_eq!(snapshot.watch_only.total(), 0);
        assert_eq!(snapshot.used, None);
    }

    #[test]
    fn trusted_confirmed_coin() {
        let coins = vec![coin(1, 5 * COIN)];
        let snapshot = compute_balance(&coins, 1, false);
        assert_eq!(snapshot.mine.trusted, 5 * COIN);
        assert_eq!(snapshot.mine.untrusted_pending, 0);
    }

    #[test]
    fn untrusted_unconfirmed_coin() {
        let mut c = coin(1, 5 * COIN);
        c.depth = 0;
        c.trusted = false;
        let snapshot = compute_balance(&[c], 1, false);
        assert_eq!(snapshot.mine.trusted, 0);
        assert_eq!(snapshot.mine.untrusted_pending, 5 * COIN);
    }

    #[test]
    fn self_originated_unconfirmed_is_trusted_at_zero_cutoff() {
        let mut c = coin(1, 5 * COIN);
        c.depth = 0;
        c.trusted = true;
        let snapshot = compute_balance(&[c], 0, false);
        assert_eq!(snapshot.mine.trusted, 5 * COIN);
    }

    #[test]
    fn shallow_coin_moves_buckets_with_cutoff() {
        let mut c = coin(1, 5 * COIN);
        c.depth = 3;
        for min_depth in 0..=6 {
            let snapshot = compute_balance(std::slice::from_ref(&c), min_depth, false);
            assert_eq!(snapshot.mine.total(), 5 * COIN);
            if min_depth <= 3 {
                assert_eq!(snapshot.mine.trusted, 5 * COIN);
            } else {
                assert_eq!(snapshot.mine.untrusted_pending, 5 * COIN);
            }
        }
    }

    #[test]
    fn immature_bucket() {
        let mut c = coin(1, 60 * COIN);
        c.generated = true;
        c.immature = true;
        let snapshot = compute_balance(&[c], 1, false);
        assert_eq!(snapshot.mine.immature, 60 * COIN);
        assert_eq!(snapshot.mine.trusted, 0);
    }

    #[test]
    fn watch_only_split() {
        let mut w = coin(2, 3 * COIN);
        w.spendability = Spendability::WatchOnly;
        let coins = vec![coin(1, 5 * COIN), w];
        let snapshot = compute_balance(&coins, 1, false);
        assert_eq!(snapshot.mine.trusted, 5 * COIN);
        assert_eq!(snapshot.watch_only.trusted, 3 * COIN);
    }

    #[test]
    fn unsolvable_counts_as_watch_only() {
        let mut c = coin(1, COIN);
        c.spendability = Spendability::Unsolvable;
        let snapshot = compute_balance(&[c], 1, false);
        assert_eq!(snapshot.watch_only.trusted, COIN);
        assert_eq!(snapshot.mine.total(), 0);
    }

    #[test]
    fn used_is_complement() {
        let mut reused = coin(2, 3 * COIN);
        reused.reused = true;
        let coins = vec![coin(1, 5 * COIN), reused];
        let snapshot = compute_balance(&coins, 1, true);
        assert_eq!(snapshot.used, Some(3 * COIN));
        // Buckets still cover the full amount.
        assert_eq!(snapshot.mine.total(), 8 * COIN);
    }

    #[test]
    fn used_absent_without_avoid_reuse() {
        let mut reused = coin(2, 3 * COIN);
        reused.reused = true;
        assert_eq!(compute_balance(&[reused], 1, false).used, None);
    }

    #[test]
    fn decomposition_invariant_across_cutoffs() {
        let mut coins = Vec::new();
        for (tag, depth, trusted, immature) in
            [(1u8, 10u64, true, false), (2, 0, false, false), (3, 0, true, false), (4, 5, true, true)]
        {
            let mut c = coin(tag, (tag as u64) * COIN);
            c.depth = depth;
            c.trusted = trusted;
            c.generated = immature;
            c.immature = immature;
            coins.push(c);
        }
        let unconstrained: u64 = coins.iter().map(|c| c.value).sum();
        for min_depth in 0..20 {
            let snapshot = compute_balance(&coins, min_depth, false);
            assert_eq!(snapshot.mine.total(), unconstrained, "cutoff {min_depth}");
        }
    }
}
