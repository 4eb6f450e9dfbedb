//! Shared test helpers: mock collaborators and wallet fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use beck_core::amount::FeeRate;
use beck_core::destination::Destination;
use beck_core::traits::{
    AddressBook, ChainView, FeeEstimateMode, FeeEstimator, LockStore, Purpose, SolvingProvider,
};
use beck_core::types::{Hash256, OutPoint, Script, Transaction, TxInput, TxOutput, SEQUENCE_FINAL};
use beck_wallet::{MemoryLockStore, Wallet};

/// Fixed "current" time used by all fixtures.
pub const NOW: u64 = 1_700_000_000;

/// Chain view with a fixed tip and externally resolvable coins.
pub struct TestChain {
    pub tip: u64,
    pub external: HashMap<OutPoint, TxOutput>,
}

impl Default for TestChain {
    fn default() -> Self {
        Self { tip: 1_000, external: HashMap::new() }
    }
}

impl ChainView for TestChain {
    fn tip_height(&self) -> u64 {
        self.tip
    }
    fn adjusted_time(&self) -> u64 {
        NOW
    }
    fn is_final(&self, tx: &Transaction) -> bool {
        tx.lock_time == 0
    }
    fn find_coins(&self, outpoints: &[OutPoint]) -> HashMap<OutPoint, TxOutput> {
        outpoints
            .iter()
            .filter_map(|op| self.external.get(op).map(|out| (*op, out.clone())))
            .collect()
    }
}

/// Estimator returning one fixed rate inside its horizon.
pub struct FixedEstimator {
    pub rate: Option<FeeRate>,
    pub max_target: u32,
}

impl Default for FixedEstimator {
    fn default() -> Self {
        Self { rate: Some(FeeRate::from_per_kb(2 * beck_core::constants::CENT)), max_target: 1008 }
    }
}

impl FeeEstimator for FixedEstimator {
    fn estimate_rate(&self, target: u32, _mode: FeeEstimateMode) -> Option<FeeRate> {
        (target <= self.max_target).then_some(self.rate).flatten()
    }
    fn max_target(&self) -> u32 {
        self.max_target
    }
}

/// Solver that can solve everything.
pub struct AllSolvable;

impl SolvingProvider for AllSolvable {
    fn is_solvable(&self, _: &Script) -> bool {
        true
    }
    fn infer_descriptor(&self, script: &Script) -> Option<String> {
        Some(format!("raw({script})"))
    }
}

/// Address book with a static label table.
#[derive(Default)]
pub struct StaticBook {
    pub labels: HashMap<Destination, String>,
}

impl AddressBook for StaticBook {
    fn label(&self, dest: &Destination) -> Option<String> {
        self.labels.get(dest).cloned()
    }
    fn purpose(&self, dest: &Destination) -> Option<Purpose> {
        self.labels.contains_key(dest).then_some(Purpose::Receive)
    }
}

/// Pubkey-hash destination from a tag byte.
pub fn dest(tag: u8) -> Destination {
    Destination::PubkeyHash([tag; 20])
}

/// A confirmed funding transaction paying `value` to `dest(tag)`.
pub fn funding_tx(tag: u8, value: u64, time: u64) -> Transaction {
    Transaction {
        version: 1,
        time,
        inputs: vec![TxInput::unsigned(
            OutPoint::new(Hash256([tag ^ 0xFF; 32]), 0),
            SEQUENCE_FINAL,
        )],
        outputs: vec![TxOutput { value, script: dest(tag).to_script() }],
        lock_time: 0,
    }
}

/// Build a wallet over the default mocks with the given lock store.
pub fn wallet_with_store(store: Arc<dyn LockStore>) -> Wallet {
    Wallet::new(
        Arc::new(TestChain::default()),
        Arc::new(FixedEstimator::default()),
        Arc::new(AllSolvable),
        store,
        Arc::new(StaticBook::default()),
    )
}

/// Build a wallet over the default mocks and a memory lock store.
pub fn wallet() -> Wallet {
    wallet_with_store(Arc::new(MemoryLockStore::new()))
}

/// Fund the wallet with one confirmed coin per (tag, value) pair, register
/// a change script, and return the coins' outpoints.
pub fn fund(wallet: &Wallet, coins: &[(u8, u64)]) -> Vec<OutPoint> {
    wallet.add_change_script(dest(0xEE).to_script());
    let mut outpoints = Vec::new();
    for (tag, value) in coins {
        wallet.register_script(dest(*tag).to_script());
        let txid = wallet
            .record_transaction(funding_tx(*tag, *value, NOW - 100_000), Some(500), false, false)
            .expect("record funding tx");
        outpoints.push(OutPoint::new(txid, 0));
    }
    outpoints
}

/// A fee policy with an explicit zero rate, for fee-free fixtures.
pub fn zero_fee_policy() -> beck_wallet::FeePolicy {
    beck_wallet::FeePolicy {
        source: beck_wallet::FeeSource::Explicit(FeeRate::ZERO),
        override_min_fee: true,
        signal_rbf: None,
    }
}
