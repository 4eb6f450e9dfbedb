//! Wallet error types.
//!
//! Variants are grouped by the failure class they report: bad arguments,
//! conflicting request parameters, resource failures that leave state
//! unchanged, and internal defects. [`WalletError::is_internal`] separates
//! the last group so callers can alert rather than reprompt.

use beck_core::amount::FeeRate;
use beck_core::error::{AmountError, StoreError};
use beck_core::types::{Hash256, OutPoint};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    // --- validation ---
    /// Invalid monetary amount or malformed request argument.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A recipient amount is below the minimum transferable unit.
    #[error("recipient {index} amount {amount} is below the minimum of {minimum}")]
    AmountTooSmall {
        index: usize,
        amount: u64,
        minimum: u64,
    },

    /// The same destination appears more than once in a request.
    #[error("duplicated destination: {0}")]
    DuplicateDestination(String),

    /// Malformed outpoint reference.
    #[error("invalid outpoint: {0}")]
    InvalidOutpoint(String),

    // --- conflicts ---
    /// Mutually exclusive fee parameters were both supplied.
    #[error("conflicting fee parameters: {0}")]
    ConflictingFeeParams(String),

    /// Unrecognized fee estimate mode string.
    #[error("unknown fee estimate mode: {0:?}")]
    UnknownFeeEstimateMode(String),

    /// Confirmation target outside the estimator's horizon.
    #[error("invalid confirmation target {target}, must be between 1 and {max}")]
    InvalidConfirmTarget { target: u32, max: u32 },

    /// An outpoint appears in both the must-include and exclude sets.
    #[error("outpoint {0} is both included and excluded")]
    OverlappingCoinSets(OutPoint),

    /// Both a change destination and a change type were requested.
    #[error("cannot specify both a change destination and a change type")]
    ConflictingChangeParams,

    /// Requested change position is beyond the output count.
    #[error("change position {index} out of bounds for {outputs} outputs")]
    ChangeIndexOutOfBounds { index: usize, outputs: usize },

    /// No registered change destination satisfies the request.
    #[error("no change destination available for the requested type")]
    NoChangeDestination,

    // --- resource ---
    /// Eligible coins cannot cover the target plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    /// The referenced output is not tracked by the wallet.
    #[error("unknown coin: {0}")]
    UnknownCoin(OutPoint),

    /// The referenced transaction is not tracked by the wallet.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(Hash256),

    /// The referenced output is already spent by a wallet transaction.
    #[error("coin already spent: {0}")]
    CoinAlreadySpent(OutPoint),

    /// Unlock was requested for an output that is not locked.
    #[error("coin is not locked: {0}")]
    NotLocked(OutPoint),

    /// Explicit fee rate below the relay minimum without an override.
    #[error("fee rate {rate} is below the minimum of {minimum}")]
    FeeBelowMinimum { rate: FeeRate, minimum: FeeRate },

    /// Deducting the fee share would push a flagged output under dust.
    #[error("fee share {fee_share} leaves recipient {index} ({amount}) below dust")]
    FeeExceedsOutput {
        index: usize,
        amount: u64,
        fee_share: u64,
    },

    /// The wallet session is unlocked for minting only.
    #[error("wallet is unlocked for minting only")]
    MintingOnly,

    /// An imported coinstake is already past its validity time.
    #[error("expired coinstake: valid at {timestamp}, now {now}")]
    ExpiredCoinstake { timestamp: u64, now: u64 },

    /// The wallet holds no key for the coinstake's stake output.
    #[error("no wallet key for the coinstake stake output")]
    CoinstakeKeyMissing,

    /// Malformed coinstake transaction.
    #[error("invalid coinstake: {0}")]
    InvalidCoinstake(String),

    /// Durable lock store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    // --- internal ---
    /// Fee and size failed to converge within the retry ceiling.
    #[error("fee did not converge after {rounds} rounds")]
    FeeConvergence { rounds: u32 },

    /// Invariant violation; a defect, not a user error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Whether this error reports a defect rather than a bad request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            WalletError::FeeConvergence { .. } | WalletError::Internal(_)
        )
    }
}

impl From<AmountError> for WalletError {
    fn from(e: AmountError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}
