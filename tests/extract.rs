use field_mapper::{
    extract::{extract, extract_records, unique_keys},
    flatten::flatten,
    locate::{FileType, resolve_rows},
    value::Cell,
};
use proptest::prelude::*;
use serde_json::{Value, json};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1_000i64..1_000).prop_map(Value::from),
        "[a-z ]{0,6}".prop_map(Value::from),
    ]
}

fn nested_value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn record() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,3}", nested_value(), 0..5)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

proptest! {
    #[test]
    fn flattening_a_flat_record_changes_nothing(input in record()) {
        let once = flatten(&input);
        let twice = flatten(&Value::Object(once.clone()));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_row_carries_exactly_the_header_set(records in prop::collection::vec(record(), 0..6)) {
        let extraction = extract_records(&records);
        prop_assert_eq!(extraction.rows.len(), records.len());
        for row in &extraction.rows {
            let keys = row.keys().cloned().collect::<Vec<_>>();
            prop_assert_eq!(&keys, &extraction.headers);
        }
    }

    #[test]
    fn header_order_is_stable_across_calls(records in prop::collection::vec(record(), 0..6)) {
        let input = Value::Array(records);
        prop_assert_eq!(unique_keys(&input), unique_keys(&input));
    }
}

#[test]
fn nested_records_project_onto_shared_headers() {
    let extraction = extract(&json!([
        {"id": 1, "name": "Alice", "meta": {"age": 30}},
        {"id": 2, "name": "Bob"}
    ]));
    assert_eq!(extraction.headers, vec!["id", "name", "meta.age"]);
    assert_eq!(extraction.rows[0]["id"], Cell::from(1));
    assert_eq!(extraction.rows[0]["name"], Cell::from("Alice"));
    assert_eq!(extraction.rows[0]["meta.age"], Cell::from(30));
    assert_eq!(extraction.rows[1]["id"], Cell::from(2));
    assert_eq!(extraction.rows[1]["name"], Cell::from("Bob"));
    assert_eq!(extraction.rows[1]["meta.age"], Cell::from(""));
}

#[test]
fn header_set_preserves_first_seen_order() {
    let headers = unique_keys(&json!([
        {"zeta": 1, "alpha": 2},
        {"mid": 3, "zeta": 4},
        {"alpha": 5, "omega": {"x": 6}}
    ]));
    assert_eq!(headers, vec!["zeta", "alpha", "mid", "omega.x"]);
}

#[test]
fn json_envelopes_resolve_to_nested_rows() {
    let payload = json!([{
        "count": 2,
        "results": [{"a": {"b": 1}}, {"c": null}]
    }]);
    let extraction = resolve_rows(&payload, FileType::Json);
    assert_eq!(extraction.headers, vec!["a.b", "c"]);
    assert!(extraction.rows[1]["a.b"].is_empty_text());
    assert!(extraction.rows[1]["c"].is_empty_text());
}

#[test]
fn array_leaves_render_comma_joined() {
    let extraction = extract(&json!([{"tags": ["x", "y"]}]));
    assert_eq!(extraction.headers, vec!["tags"]);
    assert_eq!(extraction.rows_as_strings(), vec![vec!["x,y".to_string()]]);
}
