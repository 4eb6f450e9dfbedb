//! Fee rates and amount parsing helpers.
//!
//! Fee rates are integer becks per kilobyte internally. User-supplied
//! per-byte rates carry at most three decimal places, which maps exactly
//! onto the per-kilobyte integer representation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MAX_MONEY;
use crate::error::AmountError;

/// A transaction fee rate in becks per 1000 bytes.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
)]
pub struct FeeRate {
    per_kb: u64,
}

impl FeeRate {
    pub const ZERO: Self = Self { per_kb: 0 };

    /// A rate from becks per kilobyte.
    pub fn from_per_kb(per_kb: u64) -> Self {
        Self { per_kb }
    }

    /// A rate from a user-supplied becks-per-byte value.
    ///
    /// At most three decimal places are representable; anything finer is
    /// rejected rather than silently truncated.
    pub fn from_per_byte(rate: f64) -> Result<Self, AmountError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(AmountError::Negative);
        }
        let scaled = rate * 1000.0;
        if scaled > MAX_MONEY as f64 {
            return Err(AmountError::OutOfRange(format!("fee rate {rate} per byte")));
        }
        let per_kb = scaled.round();
        if (per_kb - scaled).abs() > 1e-6 * scaled.max(1.0) {
            return Err(AmountError::TooPrecise { max: 3 });
        }
        Ok(Self { per_kb: per_kb as u64 })
    }

    /// The rate in becks per kilobyte.
    pub fn per_kb(&self) -> u64 {
        self.per_kb
    }

    /// Fee for a transaction of `size` bytes, rounded up.
    ///
    /// Uses a u128 intermediate so large rates cannot overflow.
    pub fn fee_for(&self, size: usize) -> u64 {
        let fee = (self.per_kb as u128 * size as u128).div_ceil(1000);
        fee.min(u64::MAX as u128) as u64
    }

    pub fn is_zero(&self) -> bool {
        self.per_kb == 0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}/kB", self.per_kb / 1000, self.per_kb % 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn per_byte_scales_to_per_kb() {
        let rate = FeeRate::from_per_byte(10.0).unwrap();
        assert_eq!(rate.per_kb(), 10_000);
    }

    #[test]
    fn three_decimals_accepted() {
        let rate = FeeRate::from_per_byte(1.234).unwrap();
        assert_eq!(rate.per_kb(), 1234);
    }

    #[test]
    fn four_decimals_rejected() {
        let err = FeeRate::from_per_byte(1.2345).unwrap_err();
        assert_eq!(err, AmountError::TooPrecise { max: 3 });
    }

    #[test]
    fn negative_rejected() {
        assert_eq!(
            FeeRate::from_per_byte(-1.0).unwrap_err(),
            AmountError::Negative
        );
    }

    #[test]
    fn nan_rejected() {
        assert!(FeeRate::from_per_byte(f64::NAN).is_err());
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            FeeRate::from_per_byte(1e18).unwrap_err(),
            AmountError::OutOfRange(_)
        ));
    }

    #[test]
    fn fee_rounds_up() {
        let rate = FeeRate::from_per_kb(1000);
        assert_eq!(rate.fee_for(1), 1);
        assert_eq!(rate.fee_for(1000), 1000);
        assert_eq!(rate.fee_for(1001), 1001);
    }

    #[test]
    fn zero_rate_zero_fee() {
        assert_eq!(FeeRate::ZERO.fee_for(10_000), 0);
        assert!(FeeRate::ZERO.is_zero());
    }

    #[test]
    fn display_format() {
        assert_eq!(FeeRate::from_per_kb(12_345).to_string(), "12.345/kB");
    }

    proptest! {
        #[test]
        fn fee_monotonic_in_size(per_kb in 0u64..10_000_000, a in 0usize..100_000, b in 0usize..100_000) {
            let rate = FeeRate::from_per_kb(per_kb);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rate.fee_for(lo) <= rate.fee_for(hi));
        }

        #[test]
        fn fee_at_least_proportional_floor(per_kb in 0u64..10_000_000, size in 0usize..100_000) {
            let rate = FeeRate::from_per_kb(per_kb);
            let fee = rate.fee_for(size) as u128;
            prop_assert!(fee >= per_kb as u128 * size as u128 / 1000);
        }
    }
}
