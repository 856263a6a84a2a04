use std::collections::HashSet;

use nexus_access::{Criteria, DocumentQuery, compile_count, compile_find};
use proptest::prelude::*;

fn field() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("age".to_string()),
        Just("name".to_string()),
        Just("address.city".to_string()),
        Just("value".to_string()),
        Just("first name".to_string()),
    ]
}

fn leaf() -> impl Strategy<Value = Criteria> {
    prop_oneof![
        (field(), any::<i32>()).prop_map(|(f, v)| Criteria::eq(f, v)),
        (field(), any::<i64>()).prop_map(|(f, v)| Criteria::gt(f, v)),
        (field(), "[a-z]{0,6}").prop_map(|(f, v)| Criteria::lte(f, v)),
        (field(), "[a-z]{0,6}").prop_map(|(f, v)| Criteria::starts_with(f, v)),
        (field(), prop::collection::vec(any::<i32>(), 1..5)).prop_map(|(f, vs)| Criteria::is_in(f, vs)),
        field().prop_map(Criteria::is_null),
        field().prop_map(Criteria::is_not_null),
    ]
}

fn criteria() -> impl Strategy<Value = Criteria> {
    leaf().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Criteria::and),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Criteria::or),
            inner.prop_map(Criteria::not),
        ]
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_one_parameter_per_operand(c in criteria()) {
        let expected = c.operand_count();
        let spec = compile_find(&DocumentQuery::new(c)).unwrap();
        prop_assert_eq!(spec.parameters().len(), expected);
        let names: HashSet<_> = spec.parameters().iter().map(|p| p.name.clone()).collect();
        prop_assert_eq!(names.len(), expected);
        for (i, p) in spec.parameters().iter().enumerate() {
            prop_assert_eq!(&p.name, &format!("@p{i}"));
            prop_assert!(spec.text().contains(&p.name));
        }
    }

    #[test]
    fn prop_compilation_is_deterministic(c in criteria()) {
        let q = DocumentQuery::new(c);
        let a = compile_find(&q).unwrap();
        let b = compile_find(&q).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_count_shares_predicate_with_find(c in criteria()) {
        let q = DocumentQuery::new(c);
        let find = compile_find(&q).unwrap();
        let count = compile_count(&q).unwrap();
        prop_assert!(count.text().starts_with("SELECT COUNT(1) AS _aggregate FROM ROOT r WHERE "));
        let find_where = find.text().split_once(" WHERE ").map(|(_, w)| w.to_string());
        let count_where = count.text().split_once(" WHERE ").map(|(_, w)| w.to_string());
        prop_assert_eq!(find_where, count_where);
        prop_assert_eq!(find.parameters(), count.parameters());
    }

    #[test]
    fn prop_values_never_inlined(v in "[a-z]{4,10}") {
        let v = format!("'{v}'");
        let spec = compile_find(&DocumentQuery::new(Criteria::eq("name", v.clone()))).unwrap();
        prop_assert!(!spec.text().contains(&v));
    }
}
