use nexus_access::criteria::parse_criteria_json;
use nexus_access::{CriteriaType, DocumentQuery, compile_find};
use proptest::prelude::*;

fn op() -> impl Strategy<Value = (&'static str, &'static str, CriteriaType)> {
    prop_oneof![
        Just(("$eq", "=", CriteriaType::Equal)),
        Just(("$ne", "!=", CriteriaType::NotEqual)),
        Just(("$gt", ">", CriteriaType::GreaterThan)),
        Just(("$gte", ">=", CriteriaType::GreaterThanEqual)),
        Just(("$lt", "<", CriteriaType::LessThan)),
        Just(("$lte", "<=", CriteriaType::LessThanEqual)),
    ]
}

fn as_i64(v: &bson::Bson) -> Option<i64> {
    match v {
        bson::Bson::Int32(n) => Some(i64::from(*n)),
        bson::Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 48,
        .. proptest::test_runner::Config::default()
    })]
    #[test]
    fn prop_comparison_json_compiles_to_one_binding(
        field in "[a-z][a-z0-9_]{0,7}",
        (key, symbol, kind) in op(),
        value in -1_000_000i64..1_000_000,
    ) {
        let json = format!(r#"{{"field":"{field}","{key}":{value}}}"#);
        let c = parse_criteria_json(&json).unwrap();
        prop_assert_eq!(c.kind(), kind);
        let spec = compile_find(&DocumentQuery::new(c)).unwrap();
        prop_assert_eq!(spec.parameters().len(), 1);
        prop_assert_eq!(as_i64(&spec.parameters()[0].value), Some(value));
        let tail = format!(" {symbol} @p0");
        prop_assert!(spec.text().ends_with(&tail), "text was {}", spec.text());
    }

    #[test]
    fn prop_and_of_leaves_binds_in_order(values in prop::collection::vec(0i64..1000, 1..6)) {
        let leaves: Vec<String> = values
            .iter()
            .map(|v| format!(r#"{{"field":"n","$eq":{v}}}"#))
            .collect();
        let json = format!(r#"{{"$and":[{}]}}"#, leaves.join(","));
        let spec = compile_find(&DocumentQuery::new(parse_criteria_json(&json).unwrap())).unwrap();
        let bound: Vec<_> = spec.parameters().iter().map(|p| as_i64(&p.value)).collect();
        let expected: Vec<_> = values.iter().copied().map(Some).collect();
        prop_assert_eq!(bound, expected);
    }

    #[test]
    fn prop_arbitrary_input_never_panics(s in "\\PC{0,48}") {
        let _ = parse_criteria_json(&s).map(|c| compile_find(&DocumentQuery::new(c)));
    }
}
