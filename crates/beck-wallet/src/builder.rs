//! Transaction funding and assembly.
//!
//! A build runs through a fixed sequence: validate recipients, select
//! coins, size the transaction with placeholder signatures, converge fee
//! against size, apply fee deduction to flagged outputs, decide on change,
//! and finalize with shuffled outputs. Any failure leaves no partial state;
//! the coins a build reserves are released on every exit path.

use std::collections::HashSet;

use beck_core::amount::FeeRate;
use beck_core::constants::{DUST_THRESHOLD, MAX_MONEY, MIN_TXOUT_AMOUNT};
use beck_core::destination::Destination;
use beck_core::types::{
    OutPoint, Script, Transaction, TxInput, TxOutput, SEQUENCE_ENABLE_LOCKTIME, SEQUENCE_FINAL,
    SEQUENCE_RBF,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::WalletError;
use crate::registry::Coin;
use crate::selection::{select_coins, SelectedCoin};

/// Retry ceiling for the fee/size convergence loop. Exceeding it is a
/// defect, not a user error.
pub const MAX_FEE_ITERATIONS: u32 = 10;

/// Estimated bytes per input once a placeholder signature is attached.
const INPUT_PLACEHOLDER_BYTES: usize = 148;
/// Fixed per-transaction overhead: version, time, lock time, counts.
const TX_OVERHEAD_BYTES: usize = 28;
/// Per-output overhead beyond the script bytes.
const OUTPUT_OVERHEAD_BYTES: usize = 9;

/// A payment destination with its amount.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub destination: Destination,
    /// Amount in becks.
    pub amount: u64,
    /// Deduct a pro-rata share of the fee from this output.
    pub subtract_fee: bool,
}

impl Recipient {
    pub fn new(destination: Destination, amount: u64) -> Self {
        Self { destination, amount, subtract_fee: false }
    }
}

/// A funded, unsigned transaction with its realized fee.
#[derive(Debug, Clone)]
pub struct FundedTransaction {
    pub tx: Transaction,
    /// Realized fee in becks.
    pub fee: u64,
    /// Index of the change output, if one was created.
    pub change_position: Option<usize>,
}

/// Everything a build needs beyond the wallet's shared state.
#[derive(Debug)]
pub struct BuildParams {
    /// Candidate coins, already policy-filtered.
    pub candidates: Vec<Coin>,
    /// Caller-pinned inputs, already resolved to value and script.
    pub preset: Vec<SelectedCoin>,
    /// Script receiving change.
    pub change_script: Script,
    /// Explicit change position; random when `None`.
    pub change_position: Option<usize>,
    pub avoid_partial_spends: bool,
    /// Effective fee rate.
    pub rate: FeeRate,
    /// Relay floor; `None` when overridden.
    pub min_fee_rate: Option<FeeRate>,
    /// Signal replace-by-fee on all inputs.
    pub rbf: bool,
    /// Transaction timestamp.
    pub now: u64,
    pub lock_time: u64,
}

/// Estimate the serialized size of a transaction with placeholder
/// signatures on every input.
pub fn estimate_tx_size(inputs: usize, outputs: &[TxOutput]) -> usize {
    let output_bytes: usize = outputs
        .iter()
        .map(|o| OUTPUT_OVERHEAD_BYTES + o.script.len())
        .sum();
    TX_OVERHEAD_BYTES + inputs * INPUT_PLACEHOLDER_BYTES + output_bytes
}

/// Fund and assemble an unsigned transaction.
///
/// `reserved` is the wallet's build-scoped reservation set: coins chosen
/// here are held in it while the build runs and always released before
/// returning, success or failure.
pub fn build_transaction(
    params: BuildParams,
    recipients: &[Recipient],
    reserved: &mut HashSet<OutPoint>,
) -> Result<FundedTransaction, WalletError> {
    let mut held: Vec<OutPoint> = Vec::new();
    let result = build_inner(params, recipients, reserved, &mut held);
    for outpoint in held {
        reserved.remove(&outpoint);
    }
    result
}

fn build_inner(
    params: BuildParams,
    recipients: &[Recipient],
    reserved: &mut HashSet<OutPoint>,
    held: &mut Vec<OutPoint>,
) -> Result<FundedTransaction, WalletError> {
    validate_recipients(recipients)?;

    let recipients_total: u64 = recipients
        .iter()
        .try_fold(0u64, |acc, r| acc.checked_add(r.amount))
        .filter(|total| *total <= MAX_MONEY)
        .ok_or_else(|| WalletError::InvalidAmount("recipient total overflows".into()))?;
    let subtract_total: u64 = recipients
        .iter()
        .filter(|r| r.subtract_fee)
        .map(|r| r.amount)
        .sum();
    let subtracting = subtract_total > 0;

    // Fee converges against size: a larger fee can demand more inputs,
    // which grows the size, which grows the fee. Bounded retries.
    let mut fee_guess: u64 = 0;
    let mut converged: Option<(Vec<SelectedCoin>, u64, u64)> = None;
    for _round in 0..MAX_FEE_ITERATIONS {
        let target = if subtracting {
            recipients_total
        } else {
            recipients_total.saturating_add(fee_guess)
        };

        let selection = select_coins(
            &params.candidates,
            &params.preset,
            target,
            params.avoid_partial_spends,
        )?;
        for coin in &selection.coins {
            if reserved.insert(coin.outpoint) {
                held.push(coin.outpoint);
            }
        }

        // Size with a change output included: conservative when change is
        // later folded into the fee.
        let mut sizing_outputs: Vec<TxOutput> = recipients
            .iter()
            .map(|r| TxOutput { value: r.amount, script: r.destination.to_script() })
            .collect();
        sizing_outputs.push(TxOutput { value: 0, script: params.change_script.clone() });
        let size = estimate_tx_size(selection.coins.len(), &sizing_outputs);

        let mut fee = params.rate.fee_for(size);
        if let Some(floor) = params.min_fee_rate {
            fee = fee.max(floor.fee_for(size));
        }

        let need = if subtracting { recipients_total } else { recipients_total.saturating_add(fee) };
        if selection.total >= need {
            converged = Some((selection.coins, selection.total, fee));
            break;
        }
        fee_guess = fee;
    }
    let (selected, selected_total, fee) = converged.ok_or(WalletError::FeeConvergence {
        rounds: MAX_FEE_ITERATIONS,
    })?;

    // Apply the fee to flagged outputs, pro-rata by amount. The first
    // flagged output also absorbs the rounding remainder.
    let mut output_values: Vec<u64> = recipients.iter().map(|r| r.amount).collect();
    if subtracting {
        let mut deducted: u64 = 0;
        let mut first = true;
        for (index, recipient) in recipients.iter().enumerate() {
            if !recipient.subtract_fee {
                continue;
            }
            let mut share = (fee as u128 * recipient.amount as u128 / subtract_total as u128) as u64;
            if first {
                first = false;
                // Remainder of the integer division lands here.
                let exact: u64 = recipients
                    .iter()
                    .filter(|r| r.subtract_fee)
                    .map(|r| (fee as u128 * r.amount as u128 / subtract_total as u128) as u64)
                    .sum();
                share += fee - exact;
            }
            let value = recipient.amount.checked_sub(share).unwrap_or(0);
            if value < MIN_TXOUT_AMOUNT {
                return Err(WalletError::FeeExceedsOutput {
                    index,
                    amount: recipient.amount,
                    fee_share: share,
                });
            }
            output_values[index] = value;
            deducted += share;
        }
        debug_assert_eq!(deducted, fee);
    }

    // Change decision: residual above dust gets an output, the rest is
    // folded into the fee.
    let paid_total: u64 = output_values.iter().sum();
    let residual = selected_total
        .checked_sub(paid_total)
        .and_then(|v| v.checked_sub(fee))
        .ok_or_else(|| {
            WalletError::Internal("selected value below outputs plus fee".into())
        })?;
    let (change_value, fee) = if residual > DUST_THRESHOLD {
        (Some(residual), fee)
    } else {
        (None, fee + residual)
    };

    // Finalize: shuffle recipient outputs, then place change independently
    // of the shuffle so its position carries no ordering information.
    let mut rng = rand::thread_rng();
    let mut outputs: Vec<TxOutput> = recipients
        .iter()
        .zip(&output_values)
        .map(|(r, value)| TxOutput { value: *value, script: r.destination.to_script() })
        .collect();
    outputs.shuffle(&mut rng);

    let change_position = match change_value {
        Some(value) => {
            let position = match params.change_position {
                Some(position) => {
                    if position > outputs.len() {
                        return Err(WalletError::ChangeIndexOutOfBounds {
                            index: position,
                            outputs: outputs.len() + 1,
                        });
                    }
                    position
                }
                None => rng.gen_range(0..=outputs.len()),
            };
            outputs.insert(
                position,
                TxOutput { value, script: params.change_script.clone() },
            );
            Some(position)
        }
        None => None,
    };

    let sequence = if params.rbf {
        SEQUENCE_RBF
    } else if params.lock_time > 0 {
        SEQUENCE_ENABLE_LOCKTIME
    } else {
        SEQUENCE_FINAL
    };
    let inputs: Vec<TxInput> = selected
        .iter()
        .map(|coin| TxInput::unsigned(coin.outpoint, sequence))
        .collect();

    let tx = Transaction {
        version: 1,
        time: params.now,
        inputs,
        outputs,
        lock_time: params.lock_time,
    };
    debug!(
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        fee,
        change = change_value.unwrap_or(0),
        "funded transaction"
    );

    Ok(FundedTransaction { tx, fee, change_position })
}

fn validate_recipients(recipients: &[Recipient]) -> Result<(), WalletError> {
    if recipients.is_empty() {
        return Err(WalletError::InvalidAmount("no recipients".into()));
    }
    let mut seen: HashSet<&Destination> = HashSet::with_capacity(recipients.len());
    for (index, recipient) in recipients.iter().enumerate() {
        if recipient.amount < MIN_TXOUT_AMOUNT {
            return Err(WalletError::AmountTooSmall {
                index,
                amount: recipient.amount,
                minimum: MIN_TXOUT_AMOUNT,
            });
        }
        if !seen.insert(&recipient.destination) {
            return Err(WalletError::DuplicateDestination(
                recipient.destination.to_string(),
            ));
        }
    }
    Ok(())
}
