//! Coin selection.
//!
//! Candidates are chosen to cover a target amount with few inputs and
//! little change: if any single selection unit covers the remaining target,
//! the smallest such unit wins (least overshoot); otherwise units are
//! accumulated largest-first. With avoid-partial-spends, all coins sharing
//! a script form one all-or-nothing unit, trading overshoot for less
//! address linkage.
//!
//! Policy filtering (locks, reservations, safety, reuse, depth) happens
//! before this module runs; see [`Wallet`](crate::wallet::Wallet).

use std::collections::{HashMap, HashSet};

use beck_core::destination::{Destination, DestinationKind};
use beck_core::types::{OutPoint, Script, TxOutput};
use tracing::debug;

use crate::error::WalletError;
use crate::registry::Coin;

/// A caller-pinned input. Non-wallet inputs carry their resolved output.
#[derive(Debug, Clone)]
pub struct PresetInput {
    pub outpoint: OutPoint,
    /// Value and script when the wallet does not track the output.
    pub output: Option<TxOutput>,
}

impl PresetInput {
    pub fn new(outpoint: OutPoint) -> Self {
        Self { outpoint, output: None }
    }

    pub fn external(outpoint: OutPoint, output: TxOutput) -> Self {
        Self { outpoint, output: Some(output) }
    }
}

/// Constraint bundle for selection and funding.
#[derive(Debug, Clone)]
pub struct SelectionConstraints {
    pub min_depth: u64,
    pub max_depth: u64,
    /// Restrict candidates to these destinations; empty means all.
    pub destinations: HashSet<Destination>,
    /// Inputs included unconditionally.
    pub include: Vec<PresetInput>,
    /// Outpoints removed from candidacy before selection runs.
    pub exclude: HashSet<OutPoint>,
    /// Per-coin value bounds on candidates.
    pub min_amount: u64,
    pub max_amount: u64,
    /// Exclude coins on previously spent-from scripts entirely.
    pub avoid_reuse: bool,
    /// Spend address groups all-or-nothing.
    pub avoid_partial_spends: bool,
    pub include_unsafe: bool,
    pub include_watch_only: bool,
    /// Allow selection beyond the preset inputs.
    pub add_inputs: bool,
    /// Lock the selected coins on success.
    pub lock_unspents: bool,
    pub change_destination: Option<Destination>,
    pub change_type: Option<DestinationKind>,
    /// Where the change output lands; random when unset.
    pub change_position: Option<usize>,
    /// Replace-by-fee signal; `None` defers to the fee policy default.
    pub replaceable: Option<bool>,
    /// Lock time for the funded transaction.
    pub lock_time: u64,
}

impl Default for SelectionConstraints {
    fn default() -> Self {
        Self {
            min_depth: 0,
            max_depth: u64::MAX,
            destinations: HashSet::new(),
            include: Vec::new(),
            exclude: HashSet::new(),
            min_amount: 0,
            max_amount: beck_core::constants::MAX_MONEY,
            avoid_reuse: false,
            avoid_partial_spends: false,
            include_unsafe: false,
            include_watch_only: false,
            add_inputs: true,
            lock_unspents: false,
            change_destination: None,
            change_type: None,
            change_position: None,
            replaceable: None,
            lock_time: 0,
        }
    }
}

/// A coin chosen for spending, wallet-tracked or external.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCoin {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script: Script,
}

impl From<&Coin> for SelectedCoin {
    fn from(coin: &Coin) -> Self {
        Self {
            outpoint: coin.outpoint,
            value: coin.value,
            script: coin.script.clone(),
        }
    }
}

/// Outcome of a successful selection.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Chosen coins, preset inputs first.
    pub coins: Vec<SelectedCoin>,
    /// Total value of the chosen coins.
    pub total: u64,
}

/// One all-or-nothing selection unit: a single coin, or every candidate
/// coin on one script when avoiding partial spends.
struct SelectionUnit<'a> {
    coins: Vec<&'a Coin>,
    total: u64,
}

fn group_candidates(candidates: &[Coin], by_script: bool) -> Vec<SelectionUnit<'_>> {
    if !by_script {
        return candidates
            .iter()
            .map(|c| SelectionUnit { coins: vec![c], total: c.value })
            .collect();
    }

    let mut order: Vec<&Script> = Vec::new();
    let mut groups: HashMap<&Script, SelectionUnit<'_>> = HashMap::new();
    for coin in candidates {
        let unit = groups.entry(&coin.script).or_insert_with(|| {
            order.push(&coin.script);
            SelectionUnit { coins: Vec::new(), total: 0 }
        });
        unit.coins.push(coin);
        unit.total = unit.total.saturating_add(coin.value);
    }
    order
        .into_iter()
        .filter_map(|script| groups.remove(script))
        .collect()
}

impl SelectionUnit<'_> {
    /// First outpoint of the unit, for deterministic tie-breaking.
    fn key(&self) -> OutPoint {
        self.coins
            .iter()
            .map(|c| c.outpoint)
            .min()
            .unwrap_or_else(OutPoint::null)
    }
}

/// Choose coins totalling at least `target`.
///
/// Preset coins are taken unconditionally and reduce the remaining target
/// before any selection logic runs. Terminates in one pass over the
/// candidate set plus a sort.
pub fn select_coins(
    candidates: &[Coin],
    preset: &[SelectedCoin],
    target: u64,
    avoid_partial_spends: bool,
) -> Result<SelectionResult, WalletError> {
    let preset_total: u64 = preset.iter().map(|c| c.value).sum();
    let mut coins: Vec<SelectedCoin> = preset.to_vec();
    let mut total = preset_total;

    let remaining = target.saturating_sub(preset_total);
    if remaining == 0 {
        return Ok(SelectionResult { coins, total });
    }

    let mut units = group_candidates(candidates, avoid_partial_spends);

    // Least-overshoot single unit, if one covers the remainder outright.
    if let Some(unit) = units
        .iter()
        .filter(|u| u.total >= remaining)
        .min_by_key(|u| (u.total, u.key()))
    {
        for coin in &unit.coins {
            coins.push(SelectedCoin::from(*coin));
        }
        total = total.saturating_add(unit.total);
        debug!(units = 1, total, target, "selected single unit");
        return Ok(SelectionResult { coins, total });
    }

    // Otherwise accumulate largest-first.
    units.sort_by_key(|u| (std::cmp::Reverse(u.total), u.key()));
    for unit in &units {
        for coin in &unit.coins {
            coins.push(SelectedCoin::from(*coin));
        }
        total = total.saturating_add(unit.total);
        if total >= target {
            debug!(inputs = coins.len(), total, target, "selected coins");
            return Ok(SelectionResult { coins, total });
        }
    }

    Err(WalletError::InsufficientFunds { have: total, need: target })
}
