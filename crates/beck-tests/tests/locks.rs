//! Lock manager contracts: idempotence, strictness, atomicity,
//! persistence.

use std::sync::Arc;

use beck_core::constants::COIN;
use beck_core::types::{Hash256, OutPoint};
use beck_tests::helpers::*;
use beck_wallet::{FileLockStore, WalletError};

#[test]
fn relock_nonpersistent_is_noop_success() {
    let w = wallet();
    let ops = fund(&w, &[(1, COIN)]);
    assert!(w.lock_coin(ops[0], false).unwrap());
    // Idempotent: success, but nothing changed.
    assert!(!w.lock_coin(ops[0], false).unwrap());
    assert_eq!(w.list_locked(), vec![ops[0]]);
}

#[test]
fn unlock_never_locked_is_an_error() {
    let w = wallet();
    let ops = fund(&w, &[(1, COIN)]);
    assert_eq!(
        w.unlock_coin(ops[0]).unwrap_err(),
        WalletError::NotLocked(ops[0])
    );
}

#[test]
fn lock_spent_coin_rejected() {
    let w = wallet();
    let ops = fund(&w, &[(1, 5 * COIN)]);
    let spend = beck_core::types::Transaction {
        version: 1,
        time: NOW - 1000,
        inputs: vec![beck_core::types::TxInput::unsigned(
            ops[0],
            beck_core::types::SEQUENCE_FINAL,
        )],
        outputs: vec![beck_core::types::TxOutput {
            value: 4 * COIN,
            script: dest(0x20).to_script(),
        }],
        lock_time: 0,
    };
    w.record_transaction(spend, Some(600), true, false).unwrap();
    assert_eq!(
        w.lock_coin(ops[0], false).unwrap_err(),
        WalletError::CoinAlreadySpent(ops[0])
    );
}

#[test]
fn batch_with_one_invalid_item_mutates_nothing() {
    let w = wallet();
    let ops = fund(&w, &[(1, COIN), (2, COIN), (3, COIN)]);
    let bogus = OutPoint::new(Hash256([0xBD; 32]), 0);

    // Invalid item in the middle of the batch.
    let batch = [ops[0], bogus, ops[2]];
    let err = w.lock_coins(&batch, true).unwrap_err();
    assert_eq!(err, WalletError::UnknownCoin(bogus));
    assert!(w.list_locked().is_empty());

    // The valid batch then locks all three.
    w.lock_coins(&[ops[0], ops[1], ops[2]], false).unwrap();
    assert_eq!(w.list_locked().len(), 3);
}

#[test]
fn unlock_all_clears_everything() {
    let w = wallet();
    let ops = fund(&w, &[(1, COIN), (2, COIN)]);
    w.lock_coin(ops[0], true).unwrap();
    w.lock_coin(ops[1], false).unwrap();
    w.unlock_all().unwrap();
    assert!(w.list_locked().is_empty());
    assert!(!w.is_locked(&ops[0]));
}

#[test]
fn persistent_locks_survive_wallet_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.json");

    let store = Arc::new(FileLockStore::open(&path).unwrap());
    let w = wallet_with_store(store);
    let ops = fund(&w, &[(1, COIN), (2, COIN)]);
    w.lock_coin(ops[0], true).unwrap();
    w.lock_coin(ops[1], false).unwrap();
    drop(w);

    // Fresh wallet and store over the same file: only the persistent lock
    // comes back.
    let store = Arc::new(FileLockStore::open(&path).unwrap());
    let w = wallet_with_store(store);
    fund(&w, &[(1, COIN), (2, COIN)]);
    assert_eq!(w.load_persisted_locks().unwrap(), 1);
    assert_eq!(w.list_locked(), vec![ops[0]]);
}

#[test]
fn unlock_clears_durable_state_of_persistent_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.json");

    let store = Arc::new(FileLockStore::open(&path).unwrap());
    let w = wallet_with_store(store.clone());
    let ops = fund(&w, &[(1, COIN)]);
    w.lock_coin(ops[0], true).unwrap();
    w.unlock_coin(ops[0]).unwrap();
    drop(w);

    let reopened = FileLockStore::open(&path).unwrap();
    assert!(beck_core::traits::LockStore::load_locks(&reopened)
        .unwrap()
        .is_empty());
}

#[test]
fn promotion_to_persistent_on_relock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.json");

    let store = Arc::new(FileLockStore::open(&path).unwrap());
    let w = wallet_with_store(store);
    let ops = fund(&w, &[(1, COIN)]);
    w.lock_coin(ops[0], false).unwrap();
    // Promote the memory lock.
    assert!(w.lock_coin(ops[0], true).unwrap());
    drop(w);

    let reopened = FileLockStore::open(&path).unwrap();
    assert_eq!(
        beck_core::traits::LockStore::load_locks(&reopened).unwrap(),
        vec![ops[0]]
    );
}
