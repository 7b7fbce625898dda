//! Action log behaviour seen through the engine.

use hatch_engine::{ActionLog, NewInvocation};
use hatch_foundation::{ErrorKind, FlowId, IdMinter, InvocationId, Record, record};

use crate::support::{ACT, DONE, STEP, engine};

#[tokio::test]
async fn completing_unknown_invocation_is_not_found() {
    let engine = engine(Vec::new());
    let err = engine
        .invoked(&InvocationId::from("missing"), Record::new())
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvocationNotFound(_)));
}

#[tokio::test]
async fn unregistered_action_is_rejected() {
    let engine = engine(Vec::new());
    let bogus = hatch_foundation::ActionRef::new("Lab", "explode");
    let err = engine.perform(bogus, Record::new(), None).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownAction { .. }));
    assert!(engine.log().is_empty());
}

#[tokio::test]
async fn flows_keep_creation_order() {
    let engine = engine(Vec::new());
    let flow = FlowId::from("ordered");
    for action in [ACT, STEP, DONE] {
        engine
            .perform(action, Record::new(), Some(flow.clone()))
            .await
            .unwrap();
    }
    let actions: Vec<_> = engine
        .log()
        .by_flow(&flow)
        .into_iter()
        .map(|i| i.action)
        .collect();
    assert_eq!(actions, vec![ACT, STEP, DONE]);
}

#[test]
fn audit_export_round_trips_into_a_fresh_log() {
    let log = ActionLog::new(IdMinter::seeded(3));
    let flow = FlowId::from("audited");
    let first = log
        .append(NewInvocation::new(ACT, record! { "p" => "a" }).with_flow(Some(flow.clone())))
        .unwrap();
    log.invoked(&first.id, record! { "out" => 1 }).unwrap();
    log.append(NewInvocation::new(STEP, Record::new()).with_flow(Some(flow.clone())))
        .unwrap();

    let bytes = log.export_flow(&flow).unwrap();
    let fresh = ActionLog::new(IdMinter::seeded(4));
    let imported = fresh.import(&bytes).unwrap();

    assert_eq!(imported, flow);
    assert_eq!(fresh.by_flow(&flow), log.by_flow(&flow));
}
