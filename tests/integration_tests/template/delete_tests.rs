use std::sync::Arc;

use nexus_access::backend::AccessCondition;
use nexus_access::{AccessError, Criteria, DocumentQuery, MemoryBackend, PartitionKey};

use crate::integration_tests::_support::{Account, Person, Ticket, harness, recording_template};

#[test]
fn delete_by_query_removes_only_matches() {
    let h = harness();
    for (id, status) in [("t1", "archived"), ("t2", "active"), ("t3", "archived"), ("t4", "active")] {
        h.template.insert(&Ticket::new(id, status), None).unwrap();
    }

    let mut deleted: Vec<Ticket> =
        h.template.delete(&DocumentQuery::new(Criteria::eq("status", "archived")), "tickets").unwrap();
    deleted.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(deleted, vec![Ticket::new("t1", "archived"), Ticket::new("t3", "archived")]);

    let remaining: Vec<Ticket> = h.template.find_all().unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|t| t.status == "active"));
}

#[test]
fn delete_with_no_matches_is_empty() {
    let h = harness();
    h.template.insert(&Ticket::new("t1", "active"), None).unwrap();
    let deleted: Vec<Ticket> =
        h.template.delete(&DocumentQuery::new(Criteria::eq("status", "archived")), "tickets").unwrap();
    assert!(deleted.is_empty());
    assert_eq!(h.template.count_all("tickets").unwrap(), 1);
}

#[test]
fn delete_across_partitions_uses_each_record_key() {
    let h = harness();
    for p in [
        Person::new("p1", "Ada", "Oslo", 70),
        Person::new("p2", "Bo", "Rome", 71),
        Person::new("p3", "Cy", "Rome", 20),
    ] {
        h.template.insert(&p, None).unwrap();
    }
    let deleted: Vec<Person> = h.template.delete(&DocumentQuery::new(Criteria::gt("age", 65)), "people").unwrap();
    assert_eq!(deleted.len(), 2);
    let left: Vec<Person> = h.template.find_all().unwrap();
    assert_eq!(left, vec![Person::new("p3", "Cy", "Rome", 20)]);
}

#[test]
fn delete_all_empties_collection() {
    let h = harness();
    for id in ["t1", "t2", "t3"] {
        h.template.insert(&Ticket::new(id, "x"), None).unwrap();
    }
    let gone: Vec<Ticket> = h.template.delete_all("tickets").unwrap();
    assert_eq!(gone.len(), 3);
    assert_eq!(h.template.count_all("tickets").unwrap(), 0);
}

#[test]
fn point_delete_needs_matching_partition() {
    let h = harness();
    h.template.insert(&Person::new("p1", "Ada", "Oslo", 30), None).unwrap();
    let err = h.template.delete_by_id("people", "p1", Some(PartitionKey::new("Rome"))).unwrap_err();
    assert!(matches!(err, AccessError::NotFound { .. }));
    h.template.delete_by_id("people", "p1", Some(PartitionKey::new("Oslo"))).unwrap();
}

#[test]
fn malformed_criteria_fail_before_deleting() {
    let h = harness();
    h.template.insert(&Ticket::new("t1", "x"), None).unwrap();
    let empty_in = Criteria::is_in("status", Vec::<String>::new());
    let err = h.template.delete::<Ticket>(&DocumentQuery::new(empty_in), "tickets").unwrap_err();
    assert!(matches!(err, AccessError::QueryCompilation(_)));
    assert_eq!(h.backend.records("tickets").len(), 1);
}

#[test]
fn failed_delete_aborts_batch_and_keeps_earlier_deletes() {
    let store = Arc::new(MemoryBackend::new());
    let t = recording_template(Arc::clone(&store), Some(2));
    for id in ["t1", "t2", "t3", "t4"] {
        t.insert(&Ticket::new(id, "archived"), None).unwrap();
    }

    let err = t.delete::<Ticket>(&DocumentQuery::new(Criteria::eq("status", "archived")), "tickets").unwrap_err();
    match err {
        AccessError::BackendExecution { source, .. } => assert_eq!(source.status(), 503),
        other => panic!("unexpected error: {other:?}"),
    }

    let attempted: Vec<_> = t.backend().deletes.lock().iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(attempted, ["t1", "t2", "t3"]);
    let left: Vec<_> = store.records("tickets").iter().map(|r| r.get_str("id").unwrap().to_string()).collect();
    assert_eq!(left, ["t3", "t4"]);
}

#[test]
fn versioned_delete_by_query_sends_each_record_etag() {
    let store = Arc::new(MemoryBackend::new());
    let t = recording_template(Arc::clone(&store), None);
    for (id, balance) in [("a1", 10), ("a2", 0), ("a3", 0)] {
        t.insert(&Account { id: id.into(), balance, etag: None }, None).unwrap();
    }
    // a2 now carries a second-generation token
    let a2: Account = t.find_by_id("a2", None).unwrap().unwrap();
    t.upsert(&Account { balance: 1, ..a2 }, None).unwrap();

    let etags: std::collections::HashMap<String, String> = store
        .records("accounts")
        .iter()
        .map(|r| (r.get_str("id").unwrap().to_string(), r.get_str("_etag").unwrap().to_string()))
        .collect();

    let deleted: Vec<Account> = t.delete_all("accounts").unwrap();
    assert_eq!(deleted.len(), 3);

    let calls = t.backend().deletes.lock().clone();
    assert_eq!(calls.len(), 3);
    for (id, options) in &calls {
        assert_eq!(options.access_condition, Some(AccessCondition::IfMatch(etags[id].clone())));
    }
    assert!(store.records("accounts").is_empty());
}

#[test]
fn record_without_partition_field_fails_before_any_delete() {
    let h = harness();
    h.template.insert(&Person::new("p1", "Ada", "Oslo", 70), None).unwrap();
    h.backend.seed("people", vec![bson::doc! { "id": "p2", "name": "Bo", "age": 80 }]).unwrap();

    let err = h.template.delete::<Person>(&DocumentQuery::new(Criteria::gt("age", 65)), "people").unwrap_err();
    assert!(matches!(err, AccessError::InvalidArgument(_)), "got {err:?}");
    assert_eq!(h.backend.records("people").len(), 2);
}
