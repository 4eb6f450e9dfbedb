//! Trait contracts for the wallet engine's external collaborators.
//!
//! These traits define what the engine consumes, not how it is provided:
//! - [`ChainView`] — non-blocking view of the active chain (node implements)
//! - [`FeeEstimator`] — confirmation-target fee estimation
//! - [`SolvingProvider`] — script solvability and descriptor inference
//! - [`LockStore`] — durable storage for persistent output locks
//! - [`AddressBook`] — destination labels and purposes
//!
//! All implementations must answer without blocking on network I/O: the
//! wallet calls them while holding its mutation scope.

use std::collections::HashMap;

use crate::amount::FeeRate;
use crate::destination::Destination;
use crate::error::StoreError;
use crate::types::{OutPoint, Script, Transaction, TxOutput};

/// Fee estimation mode selecting how aggressive the estimator should be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeeEstimateMode {
    #[default]
    Unset,
    Economical,
    Conservative,
}

impl FeeEstimateMode {
    /// Parse a user-supplied mode string. Returns `None` for unknown modes.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unset" => Some(Self::Unset),
            "economical" => Some(Self::Economical),
            "conservative" => Some(Self::Conservative),
            _ => None,
        }
    }
}

/// The recorded purpose of an address-book destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Purpose {
    Send,
    Receive,
}

/// Read-only view of the active chain.
pub trait ChainView: Send + Sync {
    /// Height of the current chain tip.
    fn tip_height(&self) -> u64;

    /// Network-adjusted current time in Unix seconds.
    fn adjusted_time(&self) -> u64;

    /// Whether a transaction is final in the node's current view.
    fn is_final(&self, tx: &Transaction) -> bool;

    /// Resolve outputs the wallet does not track (externally funded inputs).
    /// Unknown outpoints are simply absent from the result.
    fn find_coins(&self, outpoints: &[OutPoint]) -> HashMap<OutPoint, TxOutput>;

    /// Current proof-of-stake difficulty, for minting display only.
    fn pos_difficulty(&self) -> f64 {
        1.0
    }
}

/// Confirmation-target fee estimation.
pub trait FeeEstimator: Send + Sync {
    /// Estimated rate to confirm within `target` blocks, or `None` when the
    /// estimator has insufficient data.
    fn estimate_rate(&self, target: u32, mode: FeeEstimateMode) -> Option<FeeRate>;

    /// Largest confirmation target the estimator accepts.
    fn max_target(&self) -> u32;
}

/// Script solvability and descriptor inference.
///
/// Used only to annotate enumerated coins; signing never happens here.
pub trait SolvingProvider: Send + Sync {
    fn is_solvable(&self, script: &Script) -> bool;

    fn infer_descriptor(&self, script: &Script) -> Option<String>;
}

/// Durable storage for persistent output locks.
pub trait LockStore: Send + Sync {
    fn persist_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError>;

    fn erase_lock(&self, outpoint: &OutPoint) -> Result<(), StoreError>;

    fn load_locks(&self) -> Result<Vec<OutPoint>, StoreError>;
}

/// Destination labels and purposes.
pub trait AddressBook: Send + Sync {
    fn label(&self, dest: &Destination) -> Option<String>;

    fn purpose(&self, dest: &Destination) -> Option<Purpose>;
}
