// Integration tests for the coordinated commit protocol

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{event_log, Fault, StagedStore};
use concord::{ClosureCommitListener, Error, TransactionManager, TransactionPhase};

#[test]
fn test_transfer_commits_every_store() {
    let log = event_log();
    let tm = TransactionManager::new();
    let accounts = StagedStore::new("accounts", &log);
    let ledger = StagedStore::new("ledger", &log);
    tm.register_resource(accounts.clone()).unwrap();
    tm.register_resource(ledger.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    accounts.put("alice", 70).unwrap();
    accounts.put("bob", 30).unwrap();
    ledger.put("transfer:1", 30).unwrap();
    assert_eq!(accounts.committed("alice"), None);
    assert_eq!(accounts.get("alice"), Some(70));
    tx.commit().unwrap();

    assert_eq!(accounts.committed("alice"), Some(70));
    assert_eq!(accounts.committed("bob"), Some(30));
    assert_eq!(ledger.committed("transfer:1"), Some(30));
    assert_eq!(
        log.borrow().clone(),
        vec![
            "accounts:begin",
            "ledger:begin",
            "accounts:prepare",
            "ledger:prepare",
            "accounts:request",
            "ledger:request",
            "accounts:commit",
            "ledger:commit",
        ]
    );
}

#[test]
fn test_request_commit_runs_before_commit_for_every_store() {
    let log = event_log();
    let tm = TransactionManager::new();
    let stores: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| StagedStore::new(name, &log))
        .collect();
    for store in &stores {
        tm.register_resource(store.clone()).unwrap();
    }

    let tx = tm.create_transaction(false).unwrap();
    tx.commit().unwrap();

    for store in &stores {
        let calls = store.calls();
        let request = calls.iter().position(|c| c == "request").unwrap();
        let commit = calls.iter().position(|c| c == "commit").unwrap();
        let prepare = calls.iter().position(|c| c == "prepare").unwrap();
        assert!(prepare < request && request < commit);
    }
}

#[test]
fn test_extension_scenario() {
    let log = event_log();
    let tm = TransactionManager::new();
    let a = StagedStore::new("a", &log);
    let b = StagedStore::new("b", &log);
    a.inject("prepare", Fault::ExtendPreparation);
    tm.register_resource(a.clone()).unwrap();
    tm.register_resource(b.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    tx.commit().unwrap();

    assert_eq!(a.calls(), vec!["begin", "prepare", "prepare", "request", "commit"]);
    assert_eq!(b.calls(), vec!["begin", "prepare", "request", "commit"]);
}

#[test]
fn test_veto_rolls_back_all_stores() {
    let log = event_log();
    let tm = TransactionManager::new();
    let a = StagedStore::new("a", &log);
    let b = StagedStore::new("b", &log);
    a.inject("request", Fault::Fail("unique constraint violated"));
    tm.register_resource(a.clone()).unwrap();
    tm.register_resource(b.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    a.put("order:7", 1).unwrap();
    b.put("stock:7", -1).unwrap();
    let err = tx.commit().unwrap_err();

    match &err {
        Error::UnexpectedRollback { source, .. } => {
            assert!(source.to_string().contains("unique constraint violated"));
        }
        other => panic!("expected unexpected rollback, got {:?}", other),
    }
    assert!(a.calls().contains(&"roll_back".to_string()));
    assert!(b.calls().contains(&"roll_back".to_string()));
    assert_eq!(a.committed("order:7"), None);
    assert_eq!(b.committed("stock:7"), None);
    assert!(!a.in_transaction() && !b.in_transaction());
    assert_eq!(tm.phase(), TransactionPhase::Closed);
}

#[test]
fn test_nested_rollback_discards_root_work() {
    let log = event_log();
    let tm = TransactionManager::new();
    let store = StagedStore::new("store", &log);
    tm.register_resource(store.clone()).unwrap();

    let root = tm.create_transaction(false).unwrap();
    store.put("root", 1).unwrap();
    let nested = tm.create_transaction(false).unwrap();
    store.put("nested", 2).unwrap();
    nested.roll_back().unwrap();

    assert!(root.commit().unwrap_err().is_state_error());
    assert_eq!(store.committed("root"), None);
    assert_eq!(store.committed("nested"), None);
    assert!(!store.calls().contains(&"commit".to_string()));
    assert!(!tm.has_open_transaction());
}

#[test]
fn test_commit_failure_is_sticky() {
    let log = event_log();
    let tm = TransactionManager::new();
    let a = StagedStore::new("a", &log);
    let b = StagedStore::new("b", &log);
    b.inject("commit", Fault::Fail("network partition"));
    tm.register_resource(a.clone()).unwrap();
    tm.register_resource(b.clone()).unwrap();

    let corrupted = Rc::new(Cell::new(0));
    let closed = Rc::new(Cell::new(0));
    let (c, d) = (Rc::clone(&corrupted), Rc::clone(&closed));
    tm.register_commit_listener(
        Rc::new(
            ClosureCommitListener::new()
                .with_post_corrupted_state(move |tx, _| {
                    assert!(tx.is_some());
                    c.set(c.get() + 1);
                    Ok(())
                })
                .with_post_close(move |_| {
                    d.set(d.get() + 1);
                    Ok(())
                }),
        ),
        false,
    );

    let tx = tm.create_transaction(false).unwrap();
    a.put("k", 1).unwrap();
    b.put("k", 1).unwrap();
    let err = tx.commit().unwrap_err();

    assert!(matches!(err, Error::CorruptedState { .. }));
    assert_eq!(tm.phase(), TransactionPhase::CorruptedState);
    assert_eq!(corrupted.get(), 1);
    assert_eq!(closed.get(), 1);
    // a applied its part, nothing can reconcile that generically
    assert_eq!(a.committed("k"), Some(1));
    assert_eq!(b.committed("k"), None);

    for _ in 0..3 {
        assert!(tm.create_transaction(false).unwrap_err().is_state_error());
    }
}

#[test]
fn test_interrupted_commit_can_be_retried() {
    let log = event_log();
    let tm = TransactionManager::new();
    let store = StagedStore::new("store", &log);
    store.inject("prepare", Fault::Interrupt);
    tm.register_resource(store.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    store.put("draft", 1).unwrap();
    assert!(tx.commit().is_err());
    assert_eq!(tm.phase(), TransactionPhase::Open);

    // work continues in the reopened transaction
    store.put("draft", 2).unwrap();
    tx.commit().unwrap();
    assert_eq!(store.committed("draft"), Some(2));
}

#[test]
fn test_store_joining_open_transaction() {
    let log = event_log();
    let tm = TransactionManager::new();
    let early = StagedStore::new("early", &log);
    let late = StagedStore::new("late", &log);
    tm.register_resource(early.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    tm.register_resource(late.clone()).unwrap();
    late.put("joined", 1).unwrap();
    tx.commit().unwrap();

    assert_eq!(late.calls(), vec!["begin", "prepare", "request", "commit"]);
    assert_eq!(late.committed("joined"), Some(1));
}

#[test]
fn test_release_after_transaction() {
    let log = event_log();
    let tm = TransactionManager::new();
    let store = StagedStore::new("store", &log);
    tm.register_resource(store.clone()).unwrap();

    let tx = tm.create_transaction(false).unwrap();
    assert!(tm.release_resources().is_err());
    assert_eq!(store.released(), 0);
    tx.commit().unwrap();

    tm.release_resources().unwrap();
    assert_eq!(store.released(), 1);
}
