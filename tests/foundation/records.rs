//! Integration tests for Record and List

use hatch_foundation::{ERROR_FIELD, ErrorKind, List, Record, Value, ValueKind, record};

#[test]
fn with_is_persistent() {
    let base = record! { "user" => "u1" };
    let extended = base.clone().with("post", "p1");
    assert_eq!(base.len(), 1);
    assert_eq!(extended.len(), 2);
    assert_eq!(extended.get_str("post"), Some("p1"));
}

#[test]
fn without_leaves_original_untouched() {
    let r = record! { "a" => 1, "b" => 2 };
    let trimmed = r.without("a");
    assert!(!trimmed.contains("a"));
    assert!(r.contains("a"));
}

#[test]
fn merge_prefers_right_hand_fields() {
    let left = record! { "a" => 1, "b" => 1 };
    let right = record! { "b" => 2 };
    assert_eq!(left.merge(&right), record! { "a" => 1, "b" => 2 });
}

#[test]
fn error_records_carry_a_message() {
    let r = Record::error("Post not found.");
    assert!(r.is_error());
    assert_eq!(r.error_message(), Some("Post not found."));
    assert!(r.contains(ERROR_FIELD));
    assert!(!record! { "post" => "p" }.is_error());
}

#[test]
fn nonempty_str_rejects_empty_strings() {
    let r = record! { "caption" => "", "user" => "u" };
    assert_eq!(r.get_nonempty_str("caption"), None);
    assert_eq!(r.get_nonempty_str("user"), Some("u"));
}

#[test]
fn typed_getters_follow_field_kind() {
    let r = record! {
        "n" => 3,
        "ok" => true,
        "items" => vec!["a"],
        "inner" => record! { "x" => 1 },
    };
    assert_eq!(r.get_int("n"), Some(3));
    assert_eq!(r.get_bool("ok"), Some(true));
    assert_eq!(r.get_list("items").map(List::len), Some(1));
    assert_eq!(r.get_record("inner").and_then(|i| i.get_int("x")), Some(1));
    assert_eq!(r.get_int("ok"), None);
}

#[test]
fn require_str_names_the_field() {
    let r = record! { "n" => 3 };
    let err = r.require_str("n").unwrap_err();
    match err.kind {
        ErrorKind::InvalidInput {
            field,
            expected,
            actual,
        } => {
            assert_eq!(field, "n");
            assert_eq!(expected, ValueKind::String);
            assert_eq!(actual, Some(ValueKind::Int));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let missing = r.require_str("user").unwrap_err();
    assert!(missing.to_string().contains("missing"));
}

#[test]
fn collecting_pairs_builds_a_record() {
    let r: Record = [("a", Value::Int(1)), ("b", Value::Int(2))]
        .into_iter()
        .collect();
    assert_eq!(r, record! { "a" => 1, "b" => 2 });
}

#[test]
fn field_order_is_independent_of_insertion() {
    let a = record! { "x" => 1, "y" => 2 };
    let b = record! { "y" => 2, "x" => 1 };
    assert_eq!(a, b);
    assert_eq!(a.to_string(), b.to_string());
}
