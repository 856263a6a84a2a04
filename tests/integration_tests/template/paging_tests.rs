use nexus_access::{
    AccessError, Criteria, DocumentQuery, MemoryBackendOptions, Order, PageState, PageStatus, Sort,
};

use crate::integration_tests::_support::{Harness, Ticket, harness, harness_with};

fn seed(h: &Harness, n: usize) {
    for i in 0..n {
        let status = if i % 2 == 0 { "open" } else { "closed" };
        h.template.insert(&Ticket::new(&format!("t{i:02}"), status), None).unwrap();
    }
}

fn by_id() -> Sort {
    Sort::by("id", Order::Asc)
}

#[test]
fn walks_all_pages_via_continuation() {
    let h = harness();
    seed(&h, 7);

    let mut state = Some(PageState::first(3).with_sort(by_id()));
    let mut seen = Vec::new();
    let mut pages = 0;
    while let Some(s) = state {
        let page = h.template.find_all_paged::<Ticket>(s, "tickets").unwrap();
        assert_eq!(page.total_elements(), 7);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.number(), pages);
        assert!(page.content().len() <= 3);
        seen.extend(page.content().iter().map(|t| t.id.clone()));
        pages += 1;
        state = page.next_page();
    }
    assert_eq!(pages, 3);
    let expected: Vec<String> = (0..7).map(|i| format!("t{i:02}")).collect();
    assert_eq!(seen, expected);
}

#[test]
fn last_page_is_exhausted() {
    let h = harness();
    seed(&h, 4);
    let first = h.template.find_all_paged::<Ticket>(PageState::first(2).with_sort(by_id()), "tickets").unwrap();
    assert_eq!(first.status(), PageStatus::InProgress);
    let second = h.template.find_all_paged::<Ticket>(first.next_page().unwrap(), "tickets").unwrap();
    assert_eq!(second.status(), PageStatus::Exhausted);
    assert!(!second.has_next());
    assert!(second.next_page().is_none());
}

#[test]
fn throttled_backend_shrinks_reported_size() {
    let h = harness_with(MemoryBackendOptions { max_items_per_response: Some(2), auto_create_collections: false });
    seed(&h, 5);

    let page = h.template.find_all_paged::<Ticket>(PageState::first(4).with_sort(by_id()), "tickets").unwrap();
    assert_eq!(page.content().len(), 2);
    assert_eq!(page.size(), 2);
    assert!(page.has_next());

    let next = page.next_page().unwrap();
    assert_eq!(next.size(), 2);
    assert_eq!(next.offset(), 2);
    let second = h.template.find_all_paged::<Ticket>(next, "tickets").unwrap();
    let ids: Vec<_> = second.content().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["t02", "t03"]);
}

#[test]
fn filtered_paging_counts_only_matches() {
    let h = harness();
    seed(&h, 6);
    let query = DocumentQuery::new(Criteria::eq("status", "open")).with_page(PageState::first(2).with_sort(by_id()));
    let page = h.template.paginate::<Ticket>(&query, "tickets").unwrap();
    assert_eq!(page.total_elements(), 3);
    assert_eq!(page.total_pages(), 2);
    assert!(page.content().iter().all(|t| t.status == "open"));
}

#[test]
fn empty_result_skips_count_and_keeps_size() {
    let h = harness();
    let page = h.template.find_all_paged::<Ticket>(PageState::first(5), "tickets").unwrap();
    assert!(page.content().is_empty());
    assert_eq!(page.size(), 5);
    assert_eq!(page.total_elements(), 0);
    assert_eq!(h.diagnostics.len(), 1);
}

#[test]
fn page_state_is_required_and_nonzero() {
    let h = harness();
    let err = h.template.paginate::<Ticket>(&DocumentQuery::all(), "tickets").unwrap_err();
    assert!(matches!(err, AccessError::InvalidArgument(_)));
    let err = h.template.find_all_paged::<Ticket>(PageState::first(0), "tickets").unwrap_err();
    assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[test]
fn bogus_continuation_is_backend_error() {
    let h = harness();
    seed(&h, 2);
    let state = PageState::new(1, 1, 1, Some("not-a-token".into()));
    let err = h.template.find_all_paged::<Ticket>(state, "tickets").unwrap_err();
    match err {
        AccessError::BackendExecution { source, .. } => assert_eq!(source.status(), 400),
        other => panic!("unexpected error: {other:?}"),
    }
}
