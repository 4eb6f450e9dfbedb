//! Fee policy resolution.
//!
//! Turns the user-supplied fee directives (explicit rate, estimate mode,
//! confirmation target) into one effective policy, rejecting conflicting
//! combinations before any selection work starts.

use beck_core::amount::FeeRate;
use beck_core::constants::{DEFAULT_CONFIRM_TARGET, MIN_RELAY_FEE_PER_KB};
use beck_core::traits::{FeeEstimateMode, FeeEstimator};

use crate::error::WalletError;

/// Where the effective fee rate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    /// Caller-supplied rate.
    Explicit(FeeRate),
    /// Estimator lookup at build time.
    Estimate { target: u32, mode: FeeEstimateMode },
}

/// Resolved fee policy consumed by the transaction builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub source: FeeSource,
    /// Bypass minimum-relay-fee floors.
    pub override_min_fee: bool,
    /// Replace-by-fee signal; `None` defers to the request constraints.
    pub signal_rbf: Option<bool>,
}

impl FeePolicy {
    /// The rate the builder should use, falling back to the relay minimum
    /// when the estimator has no data.
    pub fn effective_rate(&self, estimator: &dyn FeeEstimator) -> FeeRate {
        match self.source {
            FeeSource::Explicit(rate) => rate,
            FeeSource::Estimate { target, mode } => estimator
                .estimate_rate(target, mode)
                .unwrap_or(FeeRate::from_per_kb(MIN_RELAY_FEE_PER_KB)),
        }
    }

    /// The fee-rate floor the builder must respect, if any.
    pub fn min_fee_rate(&self) -> Option<FeeRate> {
        (!self.override_min_fee).then(|| FeeRate::from_per_kb(MIN_RELAY_FEE_PER_KB))
    }
}

/// Resolve fee directives into an effective policy.
///
/// Rules are checked in order and the first violation wins:
/// 1. An explicit `fee_rate` excludes `conf_target` and any
///    `estimate_mode` other than `"unset"`; replace-by-fee defaults to
///    enabled for it. With `override_min_fee` only `rate > 0` is enforced,
///    otherwise the rate must meet the relay minimum.
/// 2. An `estimate_mode` must parse to a known mode.
/// 3. A `conf_target` must sit within the estimator's horizon.
pub fn resolve(
    conf_target: Option<u32>,
    estimate_mode: Option<&str>,
    fee_rate_per_byte: Option<f64>,
    override_min_fee: bool,
    estimator: &dyn FeeEstimator,
) -> Result<FeePolicy, WalletError> {
    if let Some(rate) = fee_rate_per_byte {
        if conf_target.is_some() {
            return Err(WalletError::ConflictingFeeParams(
                "cannot specify both conf_target and fee_rate; provide either a confirmation \
                 target in blocks or an explicit fee rate"
                    .into(),
            ));
        }
        if let Some(mode) = estimate_mode {
            if !mode.eq_ignore_ascii_case("unset") {
                return Err(WalletError::ConflictingFeeParams(
                    "cannot specify both estimate_mode and fee_rate".into(),
                ));
            }
        }

        let rate = FeeRate::from_per_byte(rate)?;
        if override_min_fee {
            if rate.is_zero() {
                return Err(WalletError::InvalidAmount(
                    "fee rate must be greater than zero".into(),
                ));
            }
        } else if rate.per_kb() < MIN_RELAY_FEE_PER_KB {
            return Err(WalletError::FeeBelowMinimum {
                rate,
                minimum: FeeRate::from_per_kb(MIN_RELAY_FEE_PER_KB),
            });
        }

        return Ok(FeePolicy {
            source: FeeSource::Explicit(rate),
            override_min_fee,
            signal_rbf: Some(true),
        });
    }

    let mode = match estimate_mode {
        Some(s) => FeeEstimateMode::parse(s)
            .ok_or_else(|| WalletError::UnknownFeeEstimateMode(s.to_string()))?,
        None => FeeEstimateMode::Unset,
    };

    let target = match conf_target {
        Some(t) => {
            let max = estimator.max_target();
            if t < 1 || t > max {
                return Err(WalletError::InvalidConfirmTarget { target: t, max });
            }
            t
        }
        None => DEFAULT_CONFIRM_TARGET,
    };

    Ok(FeePolicy {
        source: FeeSource::Estimate { target, mode },
        override_min_fee: false,
        signal_rbf: None,
    })
}
