use quill_dom::{MAX_ARRAY_INDEX, MAX_LOOP_COUNT, PathKey, Value, parse_path};
use serde_json::json;

#[test]
fn json_round_trip() {
    let source = json!({"list": [1, 2.5, "x", null, true], "nested": {"a": {"b": -3}}});
    let value = Value::from(source.clone());
    assert_eq!(value.to_json(), source);
}

#[test]
fn truthiness() {
    for falsy in [
        Value::Undefined,
        Value::Null,
        Value::Bool(false),
        Value::from(0),
        Value::Number(f64::NAN),
        Value::from(""),
    ] {
        assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
    }
    for truthy in [
        Value::from("0"),
        Value::from(-1),
        Value::Array(vec![]),
        Value::object(Vec::<(&str, Value)>::new()),
    ] {
        assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
    }
}

#[test]
fn text_coercion() {
    let list = Value::from(vec![Value::from(1), Value::from("b"), Value::Null]);
    assert_eq!(list.to_text(), "1,b,");
    assert_eq!(Value::object([("a", Value::from(1))]).to_text(), "[object Object]");
    assert_eq!(Value::Number(1e21).to_text(), "1000000000000000000000");
}

#[test]
fn loop_sources() {
    let items = Value::from(json!(["x", "y"])).iter_items();
    assert_eq!(
        items,
        vec![
            (Value::from("x"), Value::from(0)),
            (Value::from("y"), Value::from(1))
        ]
    );

    let chars = Value::from("ab").iter_items();
    assert_eq!(chars[1], (Value::from("b"), Value::from(1)));

    let object = Value::from(json!({"k1": 10, "k2": 20})).iter_items();
    assert_eq!(object[0], (Value::from(10), Value::from("k1")));

    assert_eq!(Value::from(3).iter_items().len(), 3);
    assert!(Value::from(2.5).iter_items().is_empty());
    assert!(Value::Undefined.iter_items().is_empty());
}

#[test]
fn huge_numeric_sources_are_clamped() {
    assert_eq!(Value::Number(1e18).iter_items().len(), MAX_LOOP_COUNT);
    assert!(Value::Number(f64::INFINITY).iter_items().len() <= MAX_LOOP_COUNT);
    let last = Value::from(MAX_LOOP_COUNT as f64 + 5.0).iter_items().pop();
    assert_eq!(last, Some((Value::from((MAX_LOOP_COUNT - 1) as f64), Value::from((MAX_LOOP_COUNT - 1) as f64))));
}

#[test]
fn oversized_array_writes_are_dropped() {
    let mut data = Value::from(json!({"list": [1, 2]}));
    data.set_path(&parse_path("list[4000000000000]").unwrap(), Value::from(3));
    assert_eq!(data.to_json(), json!({"list": [1, 2]}));

    data.set_path(&parse_path("list[3]").unwrap(), Value::from(4));
    assert_eq!(data.to_json(), json!({"list": [1, 2, null, 4]}));

    let mut fresh = Value::Undefined;
    fresh.set_path(&[PathKey::Index(MAX_ARRAY_INDEX + 1)], Value::from(1));
    assert_eq!(fresh, Value::Array(Vec::new()));
}

#[test]
fn set_path_overwrites_scalars() {
    let mut data = Value::from(json!({"styleObject": {"style": "color: red"}, "flag": 1}));
    data.set_path(&parse_path("styleObject.style").unwrap(), Value::from("color: green"));
    data.set_path(&parse_path("flag.inner").unwrap(), Value::from(true));
    assert_eq!(
        data.to_json(),
        json!({"styleObject": {"style": "color: green"}, "flag": {"inner": true}})
    );
}

#[test]
fn computed_members() {
    assert_eq!(PathKey::from_value(&Value::from(2)), PathKey::Index(2));
    assert_eq!(PathKey::from_value(&Value::from("a")), PathKey::Name("a".into()));
    assert_eq!(PathKey::from_value(&Value::Number(1.5)), PathKey::Name("1.5".into()));
    let text = Value::from("hey");
    assert_eq!(text.get_path(&[PathKey::Index(1)]), Value::from("e"));
}
