//! Error types shared across the Beck wallet engine.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is negative")] Negative,
    #[error("amount has more than {max} decimal places")] TooPrecise { max: u32 },
    #[error("amount out of range: {0}")] OutOfRange(String),
    #[error("amount overflow")] Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("value overflow")] ValueOverflow,
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
}

/// Failure writing or reading the durable lock store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock store: {0}")]
pub struct StoreError(pub String);
