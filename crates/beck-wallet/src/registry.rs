//! Coin registry: the wallet's record of transactions and spendable outputs.
//!
//! The registry stores every transaction affecting the wallet and derives
//! coins (unspent outputs) on demand. Values and scripts are immutable once
//! a transaction is recorded; confirmation depth, spent status, and the
//! safety/maturity/reuse flags are recomputed at query time against the
//! current chain tip.
//!
//! Not thread-safe — the owning wallet serializes access (see
//! [`Wallet`](crate::wallet::Wallet)).

use std::collections::{HashMap, HashSet};

use beck_core::constants::{GENERATED_MATURITY, MAX_MONEY};
use beck_core::destination::Destination;
use beck_core::traits::{AddressBook, ChainView, SolvingProvider};
use beck_core::types::{Hash256, OutPoint, Script, Transaction, TxOutput};
use tracing::debug;

use crate::error::WalletError;

/// A transaction recorded by the wallet, with wallet-side metadata.
#[derive(Debug, Clone)]
pub struct WalletTx {
    /// The recorded transaction.
    pub tx: Transaction,
    /// Precomputed transaction ID.
    pub txid: Hash256,
    /// Height of the confirming block, `None` while unconfirmed.
    pub height: Option<u64>,
    /// Whether every input of this transaction was funded by this wallet.
    pub from_me: bool,
    /// Whether the transaction signals replaceability.
    pub replaceable: bool,
}

impl WalletTx {
    /// Confirmation depth at the given tip. Zero while unconfirmed.
    pub fn depth(&self, tip: u64) -> u64 {
        match self.height {
            Some(h) if h <= tip => tip - h + 1,
            _ => 0,
        }
    }
}

/// How the wallet can act on a coin's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spendability {
    /// The wallet holds the spending key.
    Spendable,
    /// Tracked without a key, but the script is understood.
    WatchOnly,
    /// Tracked without a key and without a known spending method.
    Unsolvable,
}

/// An unspent output visible to the wallet, with derived flags.
#[derive(Debug, Clone)]
pub struct Coin {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script: Script,
    pub destination: Destination,
    /// Confirmation depth at enumeration time.
    pub depth: u64,
    pub spendability: Spendability,
    /// Whether the signing provider can describe a spend for the script.
    pub solvable: bool,
    /// Unsafe coins come from unconfirmed externally-originated or
    /// replaceable transactions.
    pub safe: bool,
    /// Whether the source transaction is trusted (confirmed, or
    /// self-originated, final, and non-replaceable).
    pub trusted: bool,
    /// Output of a coinbase or coinstake transaction.
    pub generated: bool,
    /// Generated output still short of the maturity depth.
    pub immature: bool,
    /// The owning script has been spent from elsewhere in wallet history.
    pub reused: bool,
    /// Source transaction timestamp, used for minting age.
    pub time: u64,
    pub label: Option<String>,
    /// Spend descriptor, present only for solvable coins.
    pub descriptor: Option<String>,
}

impl Coin {
    /// Whether the wallet can spend this coin itself.
    pub fn spendable(&self) -> bool {
        matches!(self.spendability, Spendability::Spendable)
    }
}

/// Filter for coin enumeration.
///
/// `min_sum_amount` and `max_count` are early-termination caps: once either
/// binds, enumeration stops, so callers must not assume an exhaustive
/// catalog when they are set.
#[derive(Debug, Clone)]
pub struct CoinFilter {
    pub min_depth: u64,
    pub max_depth: u64,
    /// Candidate destinations; empty means all.
    pub destinations: HashSet<Destination>,
    /// Minimum value of each coin.
    pub min_amount: u64,
    /// Maximum value of each coin.
    pub max_amount: u64,
    /// Stop once the accumulated value reaches this.
    pub min_sum_amount: Option<u64>,
    /// Stop once this many coins are collected.
    pub max_count: Option<usize>,
    pub include_unsafe: bool,
    pub include_immature: bool,
}

impl Default for CoinFilter {
    fn default() -> Self {
        Self {
            min_depth: 0,
            max_depth: u64::MAX,
            destinations: HashSet::new(),
            min_amount: 0,
            max_amount: MAX_MONEY,
            min_sum_amount: None,
            max_count: None,
            include_unsafe: true,
            include_immature: false,
        }
    }
}

/// In-memory record of wallet transactions and derived coins.
#[derive(Debug, Default)]
pub struct CoinRegistry {
    /// Primary storage: txid → wallet transaction.
    txs: HashMap<Hash256, WalletTx>,
    /// Spent outpoint → txid of the wallet transaction spending it.
    spent_by: HashMap<OutPoint, Hash256>,
    /// Scripts the wallet can sign for.
    mine: HashSet<Script>,
    /// Scripts tracked without keys.
    watch: HashSet<Script>,
    /// Scripts that have funded an input somewhere in wallet history.
    spent_scripts: HashSet<Script>,
}

impl CoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script the wallet holds keys for.
    pub fn register_script(&mut self, script: Script) {
        self.watch.remove(&script);
        self.mine.insert(script);
    }

    /// Register a watch-only script.
    ///
    /// A script already registered as spendable keeps that status.
    pub fn register_watch_script(&mut self, script: Script) {
        if !self.mine.contains(&script) {
            self.watch.insert(script);
        }
    }

    pub fn is_mine(&self, script: &Script) -> bool {
        self.mine.contains(script)
    }

    pub fn is_watch_only(&self, script: &Script) -> bool {
        self.watch.contains(script)
    }

    fn is_relevant(&self, script: &Script) -> bool {
        self.is_mine(script) || self.is_watch_only(script)
    }

    /// Record a transaction affecting the wallet.
    ///
    /// Marks the inputs' previous outputs spent and flags their owning
    /// scripts as spent-from for reuse tracking. Idempotent per txid.
    pub fn record_transaction(
        &mut self,
        tx: Transaction,
        height: Option<u64>,
        from_me: bool,
        replaceable: bool,
    ) -> Result<Hash256, WalletError> {
        let txid = tx
            .txid()
            .map_err(|e| WalletError::Internal(format!("txid of recorded tx: {e}")))?;
        if self.txs.contains_key(&txid) {
            return Ok(txid);
        }

        for input in &tx.inputs {
            let prevout = input.previous_output;
            if prevout.is_null() {
                continue;
            }
            if let Some(spent_script) = self.output(&prevout).map(|o| o.script.clone()) {
                self.spent_scripts.insert(spent_script);
            }
            self.spent_by.insert(prevout, txid);
        }

        debug!(%txid, height = ?height, from_me, "recorded wallet transaction");
        self.txs.insert(
            txid,
            WalletTx {
                tx,
                txid,
                height,
                from_me,
                replaceable,
            },
        );
        Ok(txid)
    }

    /// Attach a confirming block height to a recorded transaction.
    pub fn mark_confirmed(&mut self, txid: &Hash256, height: u64) -> Result<(), WalletError> {
        let wtx = self
            .txs
            .get_mut(txid)
            .ok_or(WalletError::UnknownTransaction(*txid))?;
        wtx.height = Some(height);
        Ok(())
    }

    /// Remove an evicted or conflicted transaction.
    ///
    /// Its inputs' previous outputs become unspent again; its own outputs
    /// cease to exist as coins.
    pub fn evict_transaction(&mut self, txid: &Hash256) -> Result<(), WalletError> {
        let wtx = self
            .txs
            .remove(txid)
            .ok_or(WalletError::UnknownTransaction(*txid))?;
        for input in &wtx.tx.inputs {
            if self.spent_by.get(&input.previous_output) == Some(txid) {
                self.spent_by.remove(&input.previous_output);
            }
        }
        debug!(%txid, "evicted wallet transaction");
        Ok(())
    }

    /// Look up a recorded transaction.
    pub fn get_tx(&self, txid: &Hash256) -> Option<&WalletTx> {
        self.txs.get(txid)
    }

    /// Whether the wallet has a record of the referenced output.
    pub fn has_output(&self, outpoint: &OutPoint) -> bool {
        self.output(outpoint).is_some()
    }

    /// The referenced output, if recorded.
    pub fn output(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.txs
            .get(&outpoint.txid)
            .and_then(|wtx| wtx.tx.outputs.get(outpoint.vout as usize))
    }

    /// Whether the output is spent by a recorded wallet transaction.
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spent_by.contains_key(outpoint)
    }

    /// Whether the script has been spent from in wallet history.
    pub fn is_reused_script(&self, script: &Script) -> bool {
        self.spent_scripts.contains(script)
    }

    /// Trust predicate: confirmed transactions are trusted; unconfirmed
    /// ones only when self-originated, final, and not replaceable.
    pub fn is_trusted(&self, wtx: &WalletTx, tip: u64, chain: &dyn ChainView) -> bool {
        if wtx.depth(tip) >= 1 {
            return true;
        }
        wtx.from_me && !wtx.replaceable && chain.is_final(&wtx.tx)
    }

    /// Enumerate unspent coins matching the filter.
    ///
    /// `excluded` outpoints (locks, reservations) are never returned.
    /// Results are a snapshot: no coin appears twice and no coin spent by a
    /// recorded wallet transaction is reported.
    pub fn available_coins(
        &self,
        filter: &CoinFilter,
        excluded: &HashSet<OutPoint>,
        chain: &dyn ChainView,
        solver: &dyn SolvingProvider,
        book: &dyn AddressBook,
    ) -> Vec<Coin> {
        let tip = chain.tip_height();
        let mut coins = Vec::new();
        let mut sum: u64 = 0;

        for wtx in self.txs.values() {
            let depth = wtx.depth(tip);
            if depth < filter.min_depth || depth > filter.max_depth {
                continue;
            }

            let trusted = self.is_trusted(wtx, tip, chain);
            let safe = depth >= 1 || trusted;
            if !filter.include_unsafe && !safe {
                continue;
            }

            let generated = wtx.tx.is_generated();
            let immature = generated && depth < GENERATED_MATURITY;
            if immature && !filter.include_immature {
                continue;
            }

            for (vout, out) in wtx.tx.outputs.iter().enumerate() {
                if out.is_empty() {
                    continue;
                }
                if !self.is_relevant(&out.script) {
                    continue;
                }
                if out.value < filter.min_amount || out.value > filter.max_amount {
                    continue;
                }

                let outpoint = OutPoint::new(wtx.txid, vout as u32);
                if self.is_spent(&outpoint) || excluded.contains(&outpoint) {
                    continue;
                }

                let destination = Destination::from_script(&out.script);
                if !filter.destinations.is_empty() && !filter.destinations.contains(&destination)
                {
                    continue;
                }

                let solvable = solver.is_solvable(&out.script);
                let spendability = if self.is_mine(&out.script) {
                    Spendability::Spendable
                } else if solvable {
                    Spendability::WatchOnly
                } else {
                    Spendability::Unsolvable
                };
                let descriptor = if solvable {
                    solver.infer_descriptor(&out.script)
                } else {
                    None
                };

                coins.push(Coin {
                    outpoint,
                    value: out.value,
                    script: out.script.clone(),
                    destination: destination.clone(),
                    depth,
                    spendability,
                    solvable,
                    safe,
                    trusted,
                    generated,
                    immature,
                    reused: self.is_reused_script(&out.script),
                    time: wtx.tx.time,
                    label: book.label(&destination),
                    descriptor,
                });

                sum = sum.saturating_add(out.value);
                if let Some(max) = filter.max_count {
                    if coins.len() >= max {
                        return coins;
                    }
                }
                if let Some(min_sum) = filter.min_sum_amount {
                    if sum >= min_sum {
                        return coins;
                    }
                }
            }
        }

        coins
    }
}
