//! Integration tests for identities and pattern variables

use hatch_foundation::{ActionRef, FlowId, IdMinter, InvocationId, QueryRef, Value, VarTable};

#[test]
fn action_refs_compare_by_pair() {
    const CREATE: ActionRef = ActionRef::new("Posting", "create");
    assert_eq!(CREATE, ActionRef::owned("Posting", "create"));
    assert_ne!(CREATE, ActionRef::new("Commenting", "create"));
    assert_eq!(CREATE.to_string(), "Posting.create");
}

#[test]
fn query_refs_expose_their_parts() {
    let q = QueryRef::new("Sessioning", "_getUser");
    assert_eq!(q.concept(), "Sessioning");
    assert_eq!(q.query(), "_getUser");
}

#[test]
fn seeded_minters_repeat_their_sequence() {
    let a = IdMinter::seeded(42);
    let b = IdMinter::seeded(42);
    for _ in 0..3 {
        assert_eq!(a.uuid(), b.uuid());
    }
}

#[test]
fn minted_ids_are_distinct_uuids() {
    let minter = IdMinter::from_entropy();
    let first = minter.invocation();
    let second = minter.invocation();
    assert_ne!(first, second);
    assert!(uuid::Uuid::parse_str(first.as_str()).is_ok());
}

#[test]
fn ids_become_string_values() {
    let flow = FlowId::from("f-1");
    assert_eq!(Value::from(flow), Value::from("f-1"));
    assert_eq!(InvocationId::new("i").as_str(), "i");
}

#[test]
fn var_table_interns_names() {
    let mut vars = VarTable::new();
    let user = vars.var("user");
    assert_eq!(vars.var("user"), user);
    let [post, comment] = vars.vars(["post", "comment"]);
    assert_eq!(vars.len(), 3);
    assert_eq!(vars.name(post), Some("post"));
    assert_eq!(vars.display(comment), "?comment");
}
