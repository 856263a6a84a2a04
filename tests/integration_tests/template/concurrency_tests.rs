use nexus_access::AccessError;

use crate::integration_tests::_support::{Account, harness};

#[test]
fn stale_version_write_is_rejected() {
    let h = harness();
    let v1 = h.template.insert(&Account { id: "a1".into(), balance: 100, etag: None }, None).unwrap();
    let first_tag = v1.etag.clone().expect("insert echoes a version token");

    let v2 = h.template.upsert(&Account { balance: 150, ..v1.clone() }, None).unwrap();
    assert_ne!(v2.etag.as_deref(), Some(first_tag.as_str()));

    let stale = Account { balance: 999, ..v1 };
    let err = h.template.upsert(&stale, None).unwrap_err();
    assert!(matches!(err, AccessError::PreconditionFailed { .. }), "got {err:?}");

    let current: Account = h.template.find_by_id("a1", None).unwrap().unwrap();
    assert_eq!(current.balance, 150);
    assert_eq!(current.etag, v2.etag);
}

#[test]
fn fresh_version_chain_succeeds() {
    let h = harness();
    let mut acct = h.template.insert(&Account { id: "a2".into(), balance: 0, etag: None }, None).unwrap();
    for n in 1..=3 {
        acct = h.template.upsert(&Account { balance: n, ..acct }, None).unwrap();
    }
    let stored: Account = h.template.find_by_id("a2", None).unwrap().unwrap();
    assert_eq!(stored.balance, 3);
}

#[test]
fn missing_token_writes_unconditionally() {
    let h = harness();
    h.template.insert(&Account { id: "a3".into(), balance: 1, etag: None }, None).unwrap();
    let blind = h.template.upsert(&Account { id: "a3".into(), balance: 7, etag: None }, None).unwrap();
    assert_eq!(blind.balance, 7);
}

#[test]
fn stale_delete_is_rejected_and_fresh_delete_succeeds() {
    let h = harness();
    let v1 = h.template.insert(&Account { id: "a4".into(), balance: 5, etag: None }, None).unwrap();
    let v2 = h.template.upsert(&Account { balance: 6, ..v1.clone() }, None).unwrap();

    let err = h.template.delete_entity(&v1, None).unwrap_err();
    assert!(matches!(err, AccessError::PreconditionFailed { .. }));

    h.template.delete_entity(&v2, None).unwrap();
    assert!(h.template.find_by_id::<Account>("a4", None).unwrap().is_none());
}

#[test]
fn conditional_upsert_of_vanished_record_fails() {
    let h = harness();
    let v1 = h.template.insert(&Account { id: "a5".into(), balance: 5, etag: None }, None).unwrap();
    h.template.delete_by_id("accounts", "a5", None).unwrap();
    let err = h.template.upsert(&v1, None).unwrap_err();
    assert!(matches!(err, AccessError::PreconditionFailed { .. }));
}
