//! Per-wallet session state.
//!
//! Carries the unlock window, the minting-only restriction, and the
//! reserved balance as explicit wallet state instead of process-wide
//! flags. Mutated only under the wallet's mutation scope; the transaction
//! builder checks it at entry.

/// Session state for one wallet.
#[derive(Debug, Clone, Default)]
pub struct WalletSession {
    /// Unix time at which the unlock lapses, `None` while locked or when
    /// the unlock has no expiry.
    unlocked_until: Option<u64>,
    /// Unlocked for minting only: the builder refuses to create spends.
    minting_only: bool,
    /// Balance withheld from minting, in becks.
    reserve_balance: u64,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an unlock window. `until = None` means no expiry.
    pub fn unlock(&mut self, until: Option<u64>, minting_only: bool) {
        self.unlocked_until = until;
        self.minting_only = minting_only;
    }

    /// Close the unlock window and clear the minting restriction.
    pub fn lock(&mut self) {
        self.unlocked_until = None;
        self.minting_only = false;
    }

    /// Expire a lapsed unlock window. Returns whether it lapsed now.
    pub fn expire(&mut self, now: u64) -> bool {
        match self.unlocked_until {
            Some(until) if until <= now => {
                self.lock();
                true
            }
            _ => false,
        }
    }

    pub fn is_minting_only(&self) -> bool {
        self.minting_only
    }

    pub fn unlocked_until(&self) -> Option<u64> {
        self.unlocked_until
    }

    pub fn set_reserve_balance(&mut self, amount: u64) {
        self.reserve_balance = amount;
    }

    pub fn reserve_balance(&self) -> u64 {
        self.reserve_balance
    }
}
