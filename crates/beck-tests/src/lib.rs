//! Scenario and property test suite for the Beck wallet engine.
//!
//! This crate contains integration tests exercising the engine the way the
//! RPC layer would: funding wallets, locking coins, resolving fee policy,
//! and building transactions end to end. Core invariants (balance
//! decomposition, selection sufficiency, lock atomicity) are verified here
//! across module boundaries.

pub mod helpers;
