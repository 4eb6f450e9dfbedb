//! Core wallet-facing transaction types.
//!
//! All monetary values are in becks (1 BECK = 10^6 becks).
//! Transactions are timestamped, as required for proof-of-stake kernels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TxError;

/// A 32-byte hash value, used for transaction IDs (BLAKE3).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub vout: u32,
}

impl OutPoint {
    /// Create an outpoint.
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            vout: u32::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// An opaque output script.
///
/// The wallet engine never interprets script semantics; it classifies
/// scripts into [`Destination`](crate::destination::Destination) kinds and
/// defers solvability to the signing provider.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// An empty script, the coinstake first-output marker.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Sequence number signalling input finality.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;
/// Sequence number enabling lock-time without opting in to replacement.
pub const SEQUENCE_ENABLE_LOCKTIME: u32 = 0xffff_fffe;
/// Sequence number opting in to replace-by-fee.
pub const SEQUENCE_RBF: u32 = 0xffff_fffd;

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Unlocking script. Empty until signed.
    pub script_sig: Vec<u8>,
    /// Sequence number; values below [`SEQUENCE_FINAL`] - 1 signal replaceability.
    pub sequence: u32,
}

impl TxInput {
    /// An unsigned input with the given outpoint and sequence.
    pub fn unsigned(previous_output: OutPoint, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence,
        }
    }

    /// Whether this input signals replace-by-fee.
    pub fn signals_rbf(&self) -> bool {
        self.sequence <= SEQUENCE_RBF
    }
}

/// A transaction output, creating a new coin.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in becks.
    pub value: u64,
    /// Locking script.
    pub script: Script,
}

impl TxOutput {
    /// The empty output that marks a coinstake transaction.
    pub fn empty() -> Self {
        Self {
            value: 0,
            script: Script::empty(),
        }
    }

    /// Coinstake marker check: zero value and an empty script.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script.is_empty()
    }
}

/// A timestamped transaction transferring value between scripts.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u32,
    /// Transaction timestamp (Unix seconds). Coinstake kernels key off it.
    pub time: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height or timestamp before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    ///
    /// Uses bincode with standard config for deterministic serialization.
    pub fn txid(&self) -> Result<Hash256, TxError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TxError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Check if this is a coinstake transaction.
    ///
    /// Proof-of-stake convention: at least one real input, at least two
    /// outputs, and an empty first output.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].previous_output.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Outputs of either generation kind require maturity before spending.
    pub fn is_generated(&self) -> bool {
        self.is_coinbase() || self.is_coinstake()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Whether any input signals replace-by-fee.
    pub fn signals_rbf(&self) -> bool {
        self.inputs.iter().any(TxInput::signals_rbf)
    }
}
