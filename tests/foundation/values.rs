//! Integration tests for Value
//!
//! Tests strict equality, hashing, ordering and display.

use std::collections::HashSet;

use hatch_foundation::{List, Value, ValueKind, record};
use proptest::prelude::*;

// =============================================================================
// Equality
// =============================================================================

#[test]
fn equality_never_coerces_between_kinds() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
    assert_ne!(Value::Int(1), Value::from("1"));
    assert_ne!(Value::Bool(true), Value::Int(1));
    assert_ne!(Value::Nil, Value::Bool(false));
}

#[test]
fn nested_values_compare_structurally() {
    let a = Value::from(record! { "tags" => vec!["x", "y"] });
    let b = Value::from(record! { "tags" => vec!["x", "y"] });
    let c = Value::from(record! { "tags" => vec!["y", "x"] });
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn floats_hash_by_bit_pattern() {
    let mut set = HashSet::new();
    set.insert(Value::Float(0.5));
    set.insert(Value::Float(0.5));
    set.insert(Value::Int(0));
    assert_eq!(set.len(), 2);
}

// =============================================================================
// Kinds and accessors
// =============================================================================

#[test]
fn kind_reports_variant() {
    assert_eq!(Value::Nil.kind(), ValueKind::Nil);
    assert_eq!(Value::from("s").kind(), ValueKind::String);
    assert_eq!(Value::from(List::new()).kind(), ValueKind::List);
    assert_eq!(Value::from(record! {}).kind(), ValueKind::Record);
}

#[test]
fn accessors_only_match_their_own_kind() {
    let v = Value::from("42");
    assert_eq!(v.as_str(), Some("42"));
    assert_eq!(v.as_int(), None);
    assert_eq!(Value::Int(42).as_str(), None);
}

#[test]
fn option_converts_to_nil() {
    let none: Option<i64> = None;
    assert!(Value::from(none).is_nil());
    assert_eq!(Value::from(Some(3)), Value::Int(3));
}

#[test]
fn cross_kind_values_are_unordered() {
    assert_eq!(Value::Int(1).partial_cmp(&Value::from("1")), None);
    assert!(Value::Int(1) < Value::Int(2));
}

#[test]
fn display_renders_lists() {
    let v = Value::from(vec![1, 2]);
    assert_eq!(v.to_string(), "[1, 2]");
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn int_and_string_forms_never_equal(n in any::<i64>()) {
        prop_assert_ne!(Value::Int(n), Value::from(n.to_string()));
    }

    #[test]
    fn string_values_roundtrip_through_as_str(s in ".*") {
        let v = Value::from(s.as_str());
        prop_assert_eq!(v.as_str(), Some(s.as_str()));
    }
}
