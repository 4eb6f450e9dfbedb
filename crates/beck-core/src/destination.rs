//! Destination classification for output scripts.
//!
//! The set of destination kinds is closed and small, so classification is a
//! tagged union with pure per-variant functions rather than open dispatch.
//! Scripts use a one-byte tag followed by the destination payload; anything
//! else is `Unknown` and round-trips as raw bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Script;

const TAG_PUBKEY_HASH: u8 = 0x01;
const TAG_SCRIPT_HASH: u8 = 0x02;
const TAG_WITNESS_KEY_HASH: u8 = 0x03;
const TAG_WITNESS_SCRIPT_HASH: u8 = 0x04;
const TAG_TAPROOT: u8 = 0x05;

/// The kind of a destination, without its payload.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    PubkeyHash,
    ScriptHash,
    WitnessKeyHash,
    WitnessScriptHash,
    Taproot,
    Unknown,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PubkeyHash => "pubkeyhash",
            Self::ScriptHash => "scripthash",
            Self::WitnessKeyHash => "witness_v0_keyhash",
            Self::WitnessScriptHash => "witness_v0_scripthash",
            Self::Taproot => "taproot",
            Self::Unknown => "unknown",
        })
    }
}

/// A classified destination.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    WitnessKeyHash([u8; 20]),
    WitnessScriptHash([u8; 32]),
    Taproot([u8; 32]),
    /// Unclassifiable script, kept verbatim so it still round-trips.
    Unknown(Vec<u8>),
}

/// Descriptive metadata for a destination, produced by pure per-variant
/// functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestinationInfo {
    pub kind: DestinationKind,
    /// Whether spending uses the witness path.
    pub witness: bool,
    /// Whether the payload commits to a script rather than a key.
    pub script_path: bool,
}

impl Destination {
    /// Classify a script. Never fails; unrecognized layouts become `Unknown`.
    pub fn from_script(script: &Script) -> Self {
        let bytes = &script.0;
        match bytes.split_first() {
            Some((&TAG_PUBKEY_HASH, rest)) if rest.len() == 20 => {
                Self::PubkeyHash(rest.try_into().expect("length checked"))
            }
            Some((&TAG_SCRIPT_HASH, rest)) if rest.len() == 20 => {
                Self::ScriptHash(rest.try_into().expect("length checked"))
            }
            Some((&TAG_WITNESS_KEY_HASH, rest)) if rest.len() == 20 => {
                Self::WitnessKeyHash(rest.try_into().expect("length checked"))
            }
            Some((&TAG_WITNESS_SCRIPT_HASH, rest)) if rest.len() == 32 => {
                Self::WitnessScriptHash(rest.try_into().expect("length checked"))
            }
            Some((&TAG_TAPROOT, rest)) if rest.len() == 32 => {
                Self::Taproot(rest.try_into().expect("length checked"))
            }
            _ => Self::Unknown(bytes.clone()),
        }
    }

    /// The canonical script for this destination.
    pub fn to_script(&self) -> Script {
        let bytes = match self {
            Self::PubkeyHash(h) => tagged(TAG_PUBKEY_HASH, h),
            Self::ScriptHash(h) => tagged(TAG_SCRIPT_HASH, h),
            Self::WitnessKeyHash(h) => tagged(TAG_WITNESS_KEY_HASH, h),
            Self::WitnessScriptHash(h) => tagged(TAG_WITNESS_SCRIPT_HASH, h),
            Self::Taproot(h) => tagged(TAG_TAPROOT, h),
            Self::Unknown(raw) => raw.clone(),
        };
        Script(bytes)
    }

    /// The kind tag, without the payload.
    pub fn kind(&self) -> DestinationKind {
        match self {
            Self::PubkeyHash(_) => DestinationKind::PubkeyHash,
            Self::ScriptHash(_) => DestinationKind::ScriptHash,
            Self::WitnessKeyHash(_) => DestinationKind::WitnessKeyHash,
            Self::WitnessScriptHash(_) => DestinationKind::WitnessScriptHash,
            Self::Taproot(_) => DestinationKind::Taproot,
            Self::Unknown(_) => DestinationKind::Unknown,
        }
    }

    /// Descriptive metadata for this destination.
    pub fn describe(&self) -> DestinationInfo {
        match self {
            Self::PubkeyHash(_) => DestinationInfo {
                kind: DestinationKind::PubkeyHash,
                witness: false,
                script_path: false,
            },
            Self::ScriptHash(_) => DestinationInfo {
                kind: DestinationKind::ScriptHash,
                witness: false,
                script_path: true,
            },
            Self::WitnessKeyHash(_) => DestinationInfo {
                kind: DestinationKind::WitnessKeyHash,
                witness: true,
                script_path: false,
            },
            Self::WitnessScriptHash(_) => DestinationInfo {
                kind: DestinationKind::WitnessScriptHash,
                witness: true,
                script_path: true,
            },
            Self::Taproot(_) => DestinationInfo {
                kind: DestinationKind::Taproot,
                witness: true,
                script_path: false,
            },
            Self::Unknown(_) => DestinationInfo {
                kind: DestinationKind::Unknown,
                witness: false,
                script_path: false,
            },
        }
    }
}

impl fmt::Display for Destination {
    /// `kind:hex-of-script`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.to_script())
    }
}

fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(tag);
    bytes.extend_from_slice(payload);
    bytes
}
