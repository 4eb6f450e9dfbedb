//! Wallet composition: one mutation scope over registry, locks, and session.
//!
//! Every public operation takes the wallet-wide mutex for its full
//! duration, so balances and enumerations are internally consistent
//! snapshots and at most one build is selecting coins at a time. The only
//! collaborator call made under the scope that may do real work is the
//! chain-view coin lookup, which implementations must answer from memory.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use beck_core::constants::STAKE_MIN_AGE_SECS;
use beck_core::destination::Destination;
use beck_core::traits::{AddressBook, ChainView, FeeEstimator, LockStore, SolvingProvider};
use beck_core::types::{Hash256, OutPoint, Script, Transaction};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::balance::{compute_balance, BalanceSnapshot};
use crate::builder::{self, BuildParams, FundedTransaction, Recipient};
use crate::error::WalletError;
use crate::fee_policy::{self, FeePolicy};
use crate::locks::LockManager;
use crate::minting::{self, MintCandidate};
use crate::registry::{Coin, CoinFilter, CoinRegistry, Spendability};
use crate::selection::{SelectedCoin, SelectionConstraints};
use crate::session::WalletSession;

/// State guarded by the wallet-wide mutation scope.
#[derive(Default)]
struct WalletInner {
    registry: CoinRegistry,
    locks: LockManager,
    /// Build-scoped reservations, distinct from user-facing locks.
    reserved: HashSet<OutPoint>,
    session: WalletSession,
    /// Imported presigned coinstakes by validity timestamp.
    coinstakes: BTreeMap<u64, Transaction>,
    /// Registered change scripts, one per destination kind in use.
    change_scripts: Vec<Script>,
}

/// The wallet engine: coin tracking, locking, balances, and funding.
pub struct Wallet {
    chain: Arc<dyn ChainView>,
    estimator: Arc<dyn FeeEstimator>,
    solver: Arc<dyn SolvingProvider>,
    store: Arc<dyn LockStore>,
    book: Arc<dyn AddressBook>,
    inner: Mutex<WalletInner>,
}

impl Wallet {
    pub fn new(
        chain: Arc<dyn ChainView>,
        estimator: Arc<dyn FeeEstimator>,
        solver: Arc<dyn SolvingProvider>,
        store: Arc<dyn LockStore>,
        book: Arc<dyn AddressBook>,
    ) -> Self {
        Self {
            chain,
            estimator,
            solver,
            store,
            book,
            inner: Mutex::new(WalletInner::default()),
        }
    }

    // ------------------------------------------------------------------
    // Registry population (driven by the external sync process)
    // ------------------------------------------------------------------

    /// Register a script the wallet holds keys for.
    pub fn register_script(&self, script: Script) {
        self.inner.lock().registry.register_script(script);
    }

    /// Register a watch-only script.
    pub fn register_watch_script(&self, script: Script) {
        self.inner.lock().registry.register_watch_script(script);
    }

    /// Register a script usable for change outputs. Also registered as
    /// spendable.
    pub fn add_change_script(&self, script: Script) {
        let mut inner = self.inner.lock();
        inner.registry.register_script(script.clone());
        inner.change_scripts.push(script);
    }

    /// Record a transaction affecting the wallet.
    pub fn record_transaction(
        &self,
        tx: Transaction,
        height: Option<u64>,
        from_me: bool,
        replaceable: bool,
    ) -> Result<Hash256, WalletError> {
        self.inner
            .lock()
            .registry
            .record_transaction(tx, height, from_me, replaceable)
    }

    /// Attach a confirming height to a recorded transaction.
    pub fn mark_confirmed(&self, txid: &Hash256, height: u64) -> Result<(), WalletError> {
        self.inner.lock().registry.mark_confirmed(txid, height)
    }

    /// Drop an evicted or conflicted transaction.
    pub fn evict_transaction(&self, txid: &Hash256) -> Result<(), WalletError> {
        self.inner.lock().registry.evict_transaction(txid)
    }

    // ------------------------------------------------------------------
    // Enumeration and balances
    // ------------------------------------------------------------------

    /// Enumerate unspent coins matching the filter. Locked and reserved
    /// coins are never returned.
    pub fn available_coins(&self, filter: &CoinFilter) -> Vec<Coin> {
        let inner = self.inner.lock();
        let excluded = self.selection_excluded(&inner);
        inner.registry.available_coins(
            filter,
            &excluded,
            &*self.chain,
            &*self.solver,
            &*self.book,
        )
    }

    /// Compute the balance snapshot at a depth cutoff.
    pub fn balance(&self, min_depth: u64, avoid_reuse: bool) -> BalanceSnapshot {
        let inner = self.inner.lock();
        let coins = self.all_coins(&inner);
        compute_balance(&coins, min_depth, avoid_reuse)
    }

    // ------------------------------------------------------------------
    // Locks
    // ------------------------------------------------------------------

    /// Lock one output. Re-locking non-persistently is a no-op success;
    /// the return value reports whether the lock state changed.
    pub fn lock_coin(&self, outpoint: OutPoint, persistent: bool) -> Result<bool, WalletError> {
        let mut inner = self.inner.lock();
        Self::validate_lockable(&inner.registry, &outpoint)?;
        inner.locks.lock(outpoint, persistent, &*self.store)
    }

    /// Unlock one output. Fails with [`WalletError::NotLocked`] if it is
    /// not locked.
    pub fn unlock_coin(&self, outpoint: OutPoint) -> Result<(), WalletError> {
        self.inner.lock().locks.unlock(outpoint, &*self.store)
    }

    /// Atomically lock a batch: every outpoint is validated before any
    /// state changes, so one bad entry leaves the whole batch unlocked.
    pub fn lock_coins(&self, outpoints: &[OutPoint], persistent: bool) -> Result<(), WalletError> {
        let mut inner = self.inner.lock();
        for outpoint in outpoints {
            Self::validate_lockable(&inner.registry, outpoint)?;
        }
        inner.locks.lock_many(outpoints, persistent, &*self.store)
    }

    /// Atomically unlock a batch; all-or-nothing like [`Self::lock_coins`].
    pub fn unlock_coins(&self, outpoints: &[OutPoint]) -> Result<(), WalletError> {
        let mut inner = self.inner.lock();
        for outpoint in outpoints {
            if !inner.registry.has_output(outpoint) {
                return Err(WalletError::UnknownCoin(*outpoint));
            }
            if !inner.locks.is_locked(outpoint) {
                return Err(WalletError::NotLocked(*outpoint));
            }
        }
        inner.locks.unlock_many(outpoints, &*self.store)
    }

    /// Clear every lock.
    pub fn unlock_all(&self) -> Result<(), WalletError> {
        self.inner.lock().locks.unlock_all(&*self.store)
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.inner.lock().locks.is_locked(outpoint)
    }

    pub fn list_locked(&self) -> Vec<OutPoint> {
        self.inner.lock().locks.list_locked()
    }

    /// Adopt persistent locks from the durable store (startup path).
    pub fn load_persisted_locks(&self) -> Result<usize, WalletError> {
        let persisted = self.store.load_locks()?;
        let adopted = self.inner.lock().locks.adopt_persisted(persisted);
        info!(adopted, "loaded persisted locks");
        Ok(adopted)
    }

    // ------------------------------------------------------------------
    // Fee policy
    // ------------------------------------------------------------------

    /// Resolve fee directives against this wallet's estimator.
    pub fn resolve_fee_policy(
        &self,
        conf_target: Option<u32>,
        estimate_mode: Option<&str>,
        fee_rate_per_byte: Option<f64>,
        override_min_fee: bool,
    ) -> Result<FeePolicy, WalletError> {
        fee_policy::resolve(
            conf_target,
            estimate_mode,
            fee_rate_per_byte,
            override_min_fee,
            &*self.estimator,
        )
    }

    // ------------------------------------------------------------------
    // Transaction building
    // ------------------------------------------------------------------

    /// Fund and assemble an unsigned transaction.
    ///
    /// Holds the wallet scope for the whole build; the chosen coins are
    /// reserved for its duration and released on success and failure
    /// alike. With `lock_unspents`, the selected coins become user-level
    /// locks on success.
    pub fn build_transaction(
        &self,
        recipients: &[Recipient],
        constraints: &SelectionConstraints,
        policy: &FeePolicy,
    ) -> Result<FundedTransaction, WalletError> {
        let mut guard = self.inner.lock();
        let now = self.chain.adjusted_time();

        guard.session.expire(now);
        if guard.session.is_minting_only() {
            return Err(WalletError::MintingOnly);
        }

        if let Some(position) = constraints.change_position {
            if position > recipients.len() {
                return Err(WalletError::ChangeIndexOutOfBounds {
                    index: position,
                    outputs: recipients.len() + 1,
                });
            }
        }

        let change_script = Self::resolve_change_script(&guard, constraints)?;
        let preset = Self::resolve_preset(&guard.registry, &*self.chain, constraints)?;

        let mut excluded = self.selection_excluded(&guard);
        excluded.extend(constraints.exclude.iter().copied());
        excluded.extend(preset.iter().map(|c| c.outpoint));

        let filter = CoinFilter {
            min_depth: constraints.min_depth,
            max_depth: constraints.max_depth,
            destinations: constraints.destinations.clone(),
            min_amount: constraints.min_amount,
            max_amount: constraints.max_amount,
            min_sum_amount: None,
            max_count: None,
            include_unsafe: constraints.include_unsafe,
            include_immature: false,
        };
        let mut candidates = if constraints.add_inputs {
            guard.registry.available_coins(
                &filter,
                &excluded,
                &*self.chain,
                &*self.solver,
                &*self.book,
            )
        } else {
            Vec::new()
        };
        candidates.retain(|coin| {
            if constraints.avoid_reuse && coin.reused {
                return false;
            }
            match coin.spendability {
                Spendability::Spendable => true,
                Spendability::WatchOnly => constraints.include_watch_only && coin.solvable,
                Spendability::Unsolvable => false,
            }
        });

        let rate = policy.effective_rate(&*self.estimator);
        let params = BuildParams {
            candidates,
            preset,
            change_script,
            change_position: constraints.change_position,
            avoid_partial_spends: constraints.avoid_partial_spends,
            rate,
            min_fee_rate: policy.min_fee_rate(),
            rbf: constraints.replaceable.or(policy.signal_rbf).unwrap_or(false),
            now,
            lock_time: constraints.lock_time,
        };

        let inner = &mut *guard;
        let funded = builder::build_transaction(params, recipients, &mut inner.reserved)?;

        if constraints.lock_unspents {
            for input in &funded.tx.inputs {
                inner.locks.lock(input.previous_output, false, &*self.store)?;
            }
            debug!(inputs = funded.tx.inputs.len(), "locked selected coins");
        }

        Ok(funded)
    }

    // ------------------------------------------------------------------
    // Minting
    // ------------------------------------------------------------------

    /// Enumerate mintable outputs and imported coinstakes.
    pub fn list_minting(&self, count: Option<usize>) -> Vec<MintCandidate> {
        let inner = self.inner.lock();
        let coins = self.all_coins(&inner);
        minting::list_minting(&coins, &inner.coinstakes, &*self.chain, count)
    }

    /// Import a presigned coinstake for later minting.
    pub fn import_coinstake(
        &self,
        tx: Transaction,
        timestamp: Option<u64>,
    ) -> Result<Hash256, WalletError> {
        let mut inner = self.inner.lock();
        let now = self.chain.adjusted_time();
        let (timestamp, txid) = minting::validate_coinstake_import(
            &tx,
            timestamp,
            now,
            &inner.registry,
            &*self.solver,
        )?;
        inner.coinstakes.insert(timestamp, tx);
        info!(%txid, timestamp, "imported coinstake");
        Ok(txid)
    }

    /// Spendable stake-mature balance after the reserve, in becks.
    pub fn mintable_balance(&self) -> u64 {
        let inner = self.inner.lock();
        let now = self.chain.adjusted_time();
        let total: u64 = self
            .all_coins(&inner)
            .iter()
            .filter(|c| {
                c.spendable()
                    && !c.immature
                    && now.saturating_sub(c.time) >= STAKE_MIN_AGE_SECS
            })
            .map(|c| c.value)
            .sum();
        total.saturating_sub(inner.session.reserve_balance())
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Open an unlock window, optionally restricted to minting.
    pub fn unlock_session(&self, until: Option<u64>, minting_only: bool) {
        self.inner.lock().session.unlock(until, minting_only);
    }

    /// Close the unlock window.
    pub fn lock_session(&self) {
        self.inner.lock().session.lock();
    }

    /// Withhold an amount from minting.
    pub fn set_reserve_balance(&self, amount: u64) {
        self.inner.lock().session.set_reserve_balance(amount);
    }

    pub fn reserve_balance(&self) -> u64 {
        self.inner.lock().session.reserve_balance()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Outpoints never offered to automatic selection.
    fn selection_excluded(&self, inner: &WalletInner) -> HashSet<OutPoint> {
        let mut excluded: HashSet<OutPoint> =
            inner.locks.list_locked().into_iter().collect();
        excluded.extend(inner.reserved.iter().copied());
        excluded
    }

    /// Unconstrained enumeration for balance and minting.
    fn all_coins(&self, inner: &WalletInner) -> Vec<Coin> {
        let filter = CoinFilter {
            include_unsafe: true,
            include_immature: true,
            ..CoinFilter::default()
        };
        inner.registry.available_coins(
            &filter,
            &HashSet::new(),
            &*self.chain,
            &*self.solver,
            &*self.book,
        )
    }

    fn validate_lockable(
        registry: &CoinRegistry,
        outpoint: &OutPoint,
    ) -> Result<(), WalletError> {
        if !registry.has_output(outpoint) {
            return Err(WalletError::UnknownCoin(*outpoint));
        }
        if registry.is_spent(outpoint) {
            return Err(WalletError::CoinAlreadySpent(*outpoint));
        }
        Ok(())
    }

    fn resolve_change_script(
        inner: &WalletInner,
        constraints: &SelectionConstraints,
    ) -> Result<Script, WalletError> {
        if constraints.change_destination.is_some() && constraints.change_type.is_some() {
            return Err(WalletError::ConflictingChangeParams);
        }
        if let Some(dest) = &constraints.change_destination {
            return Ok(dest.to_script());
        }
        if let Some(kind) = constraints.change_type {
            return inner
                .change_scripts
                .iter()
                .find(|s| Destination::from_script(s).kind() == kind)
                .cloned()
                .ok_or(WalletError::NoChangeDestination);
        }
        inner
            .change_scripts
            .last()
            .cloned()
            .ok_or(WalletError::NoChangeDestination)
    }

    /// Resolve caller-pinned inputs to values and scripts.
    ///
    /// Wallet-tracked outputs come from the registry; external ones from
    /// the constraint bundle or the chain view.
    fn resolve_preset(
        registry: &CoinRegistry,
        chain: &dyn ChainView,
        constraints: &SelectionConstraints,
    ) -> Result<Vec<SelectedCoin>, WalletError> {
        let mut preset = Vec::with_capacity(constraints.include.len());
        let mut seen: HashSet<OutPoint> = HashSet::new();
        let mut missing: Vec<OutPoint> = Vec::new();

        for input in &constraints.include {
            if constraints.exclude.contains(&input.outpoint) {
                return Err(WalletError::OverlappingCoinSets(input.outpoint));
            }
            if !seen.insert(input.outpoint) {
                return Err(WalletError::InvalidOutpoint(format!(
                    "duplicate input {}",
                    input.outpoint
                )));
            }
            if let Some(out) = registry.output(&input.outpoint) {
                if registry.is_spent(&input.outpoint) {
                    return Err(WalletError::CoinAlreadySpent(input.outpoint));
                }
                preset.push(SelectedCoin {
                    outpoint: input.outpoint,
                    value: out.value,
                    script: out.script.clone(),
                });
            } else if let Some(out) = &input.output {
                preset.push(SelectedCoin {
                    outpoint: input.outpoint,
                    value: out.value,
                    script: out.script.clone(),
                });
            } else {
                missing.push(input.outpoint);
            }
        }

        if !missing.is_empty() {
            let found = chain.find_coins(&missing);
            for outpoint in missing {
                let out = found
                    .get(&outpoint)
                    .ok_or(WalletError::UnknownCoin(outpoint))?;
                preset.push(SelectedCoin {
                    outpoint,
                    value: out.value,
                    script: out.script.clone(),
                });
            }
        }

        Ok(preset)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Wallet")
            .field("locked", &inner.locks.len())
            .field("reserved", &inner.reserved.len())
            .field("coinstakes", &inner.coinstakes.len())
            .finish()
    }
}
