use nexus_access::{AccessError, Criteria, DocumentQuery, Order, PartitionKey, Sort};

use crate::integration_tests::_support::{Person, Ticket, harness};

fn seed_people(t: &nexus_access::DocumentTemplate<std::sync::Arc<nexus_access::MemoryBackend>>) {
    for p in [
        Person::new("p1", "Ada", "Oslo", 36),
        Person::new("p2", "Bo", "Oslo", 25),
        Person::new("p3", "Cy", "Rome", 41),
        Person::new("p4", "Di", "Rome", 19),
        Person::new("p5", "Ed", "Lima", 52),
    ] {
        t.insert(&p, None).unwrap();
    }
}

#[test]
fn insert_then_point_read_round_trips() {
    let h = harness();
    let ada = Person::new("p1", "Ada", "Oslo", 36);
    let stored = h.template.insert(&ada, None).unwrap();
    assert_eq!(stored, ada);

    let found: Option<Person> = h.template.find_by_id("p1", Some(PartitionKey::new("Oslo"))).unwrap();
    assert_eq!(found, Some(ada.clone()));

    // query form without a partition key
    let found: Option<Person> = h.template.find_by_id("p1", None).unwrap();
    assert_eq!(found, Some(ada));
}

#[test]
fn missing_id_is_none_not_error() {
    let h = harness();
    seed_people(&h.template);
    let wrong_partition: Option<Person> = h.template.find_by_id("p1", Some(PartitionKey::new("Rome"))).unwrap();
    assert!(wrong_partition.is_none());
    let absent: Option<Person> = h.template.find_by_id("nobody", None).unwrap();
    assert!(absent.is_none());
}

#[test]
fn duplicate_insert_is_backend_execution() {
    let h = harness();
    let t = Ticket::new("t1", "open");
    h.template.insert(&t, None).unwrap();
    let err = h.template.insert(&t, None).unwrap_err();
    match err {
        AccessError::BackendExecution { source, .. } => assert_eq!(source.status(), 409),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn blank_id_is_rejected_before_the_backend() {
    let h = harness();
    assert!(matches!(h.template.find_by_id::<Person>(" ", None), Err(AccessError::InvalidArgument(_))));
    assert!(h.diagnostics.is_empty());
}

#[test]
fn find_by_ids_and_empty_list() {
    let h = harness();
    seed_people(&h.template);
    let mut people: Vec<Person> = h.template.find_by_ids(&["p1", "p3", "zz"], "people").unwrap();
    people.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<_> = people.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p3"]);

    let before = h.diagnostics.len();
    let none: Vec<Person> = h.template.find_by_ids::<Person, &str>(&[], "people").unwrap();
    assert!(none.is_empty());
    assert_eq!(h.diagnostics.len(), before);
}

#[test]
fn find_with_sort_and_partition_pinned_filter() {
    let h = harness();
    seed_people(&h.template);

    let query = DocumentQuery::new(Criteria::gte("age", 25)).with_sort(Sort::by("age", Order::Desc));
    let people: Vec<Person> = h.template.find(&query, "people").unwrap();
    let names: Vec<_> = people.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Ed", "Cy", "Ada", "Bo"]);

    let oslo = DocumentQuery::new(Criteria::and(vec![Criteria::eq("city", "Oslo"), Criteria::lt("age", 30)]));
    let people: Vec<Person> = h.template.find(&oslo, "people").unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Bo");
}

#[test]
fn exists_and_counts() {
    let h = harness();
    seed_people(&h.template);
    assert!(h.template.exists::<Person>(&DocumentQuery::new(Criteria::eq("city", "Lima")), "people").unwrap());
    assert!(!h.template.exists::<Person>(&DocumentQuery::new(Criteria::eq("city", "Kyiv")), "people").unwrap());

    assert_eq!(h.template.count_all("people").unwrap(), 5);
    let rome = DocumentQuery::new(Criteria::eq("city", "Rome"));
    assert_eq!(h.template.count::<Person>(&rome, "people").unwrap(), 2);

    h.template.delete_by_id("people", "p1", Some(PartitionKey::new("Oslo"))).unwrap();
    h.template.delete_by_id("people", "p5", Some(PartitionKey::new("Lima"))).unwrap();
    assert_eq!(h.template.count_all("people").unwrap(), 3);
}

#[test]
fn find_all_uses_entity_collection() {
    let h = harness();
    h.template.insert(&Ticket::new("t1", "open"), None).unwrap();
    h.template.insert(&Ticket::new("t2", "closed"), None).unwrap();
    let all: Vec<Ticket> = h.template.find_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(h.template.collection_name::<Ticket>().unwrap(), "tickets");
}

#[test]
fn missing_collection_reads_recover_but_count_does_not() {
    let h = harness();
    let found: Vec<Ticket> = h.template.find(&DocumentQuery::all(), "ghost").unwrap();
    assert!(found.is_empty());
    assert!(!h.template.exists::<Ticket>(&DocumentQuery::all(), "ghost").unwrap());
    assert!(matches!(h.template.count_all("ghost"), Err(AccessError::NotFound { .. })));
}

#[test]
fn delete_missing_item_is_not_found() {
    let h = harness();
    let err = h.template.delete_by_id("tickets", "nope", None).unwrap_err();
    assert!(matches!(err, AccessError::NotFound { .. }));
}

#[test]
fn collection_lifecycle() {
    let h = harness();
    h.template.insert(&Ticket::new("t1", "open"), None).unwrap();
    let again = h.template.create_collection_for::<Ticket>().unwrap();
    assert_eq!(again.name, "tickets");
    assert_eq!(h.backend.records("tickets").len(), 1);

    h.template.delete_collection("tickets").unwrap();
    assert!(matches!(h.template.delete_collection("tickets"), Err(AccessError::NotFound { .. })));
}

#[test]
#[should_panic]
fn operations_panic_inside_an_async_context() {
    let h = harness();
    let outer = tokio::runtime::Builder::new_current_thread().build().unwrap();
    outer.block_on(async {
        let _ = h.template.count_all("tickets");
    });
}
