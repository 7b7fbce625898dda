//! Engine-wide guarantees: idempotent firing, flow isolation, join
//! correctness, strict literals and consistent variables.

use hatch_engine::{
    ConceptRegistry, EngineConfig, RuleRegistry, SyncBody, SyncEngine, SyncRule, Where, fields,
};
use hatch_foundation::{ErrorKind, FlowId, QueryRef, Record, SemanticLimit, Value, record};

use crate::support::{
    ACT, DONE, LOOKUP, Lab, STEP, USERS, engine, engine_with, inputs, str_field,
};

fn pair_rule() -> SyncRule {
    SyncRule::define("Pair", |v| {
        let value = v.var("v");
        SyncBody::new()
            .when(ACT, fields! { "p" => value })
            .when(STEP, fields! { "p" => value })
            .then(DONE, fields! { "v" => value })
    })
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn combination_fires_once_across_every_event() {
    let engine = engine(vec![pair_rule()]);
    let flow = FlowId::from("idem");
    let act = engine
        .invoke(ACT, record! { "p" => "x" }, Some(flow.clone()))
        .await
        .unwrap();
    let step = engine
        .invoke(STEP, record! { "p" => "x" }, Some(flow.clone()))
        .await
        .unwrap();
    engine.invoked(&act, Record::new()).await.unwrap();
    engine.invoked(&step, Record::new()).await.unwrap();

    assert_eq!(inputs(&engine, &flow, &DONE).len(), 1);
}

#[tokio::test]
async fn new_partner_forms_a_new_combination() {
    let engine = engine(vec![pair_rule()]);
    let flow = FlowId::from("fresh");
    for _ in 0..2 {
        engine
            .perform(ACT, record! { "p" => "x" }, Some(flow.clone()))
            .await
            .unwrap();
    }
    engine
        .perform(STEP, record! { "p" => "x" }, Some(flow.clone()))
        .await
        .unwrap();

    // Both acts pair with the single step.
    assert_eq!(inputs(&engine, &flow, &DONE).len(), 2);
}

#[tokio::test]
async fn symmetric_templates_fire_once_per_pair() {
    let rule = SyncRule::define("Twice", |_| {
        SyncBody::new()
            .when(STEP, fields! {})
            .when(STEP, fields! {})
            .then(DONE, fields! {})
    });
    let engine = engine(vec![rule]);
    let flow = FlowId::from("twins");
    for _ in 0..2 {
        engine
            .perform(STEP, Record::new(), Some(flow.clone()))
            .await
            .unwrap();
    }

    assert_eq!(inputs(&engine, &flow, &DONE).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completions_in_one_flow_fire_once() {
    let rule = SyncRule::define("Settled", |v| {
        let value = v.var("v");
        SyncBody::new()
            .when_done(ACT, fields! { "p" => value }, fields! {})
            .when_done(STEP, fields! { "p" => value }, fields! {})
            .then(DONE, fields! { "v" => value })
    });
    let engine = engine(vec![rule]);

    for round in 0..20 {
        let flow = FlowId::from(format!("race-{round}"));
        let act = engine
            .invoke(ACT, record! { "p" => "x" }, Some(flow.clone()))
            .await
            .unwrap();
        let step = engine
            .invoke(STEP, record! { "p" => "x" }, Some(flow.clone()))
            .await
            .unwrap();

        let left = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.invoked(&act, Record::new()).await })
        };
        let right = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.invoked(&step, Record::new()).await })
        };
        left.await.unwrap().unwrap();
        right.await.unwrap().unwrap();

        assert_eq!(inputs(&engine, &flow, &DONE), vec![record! { "v" => "x" }]);
    }
}

// =============================================================================
// Flow isolation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flows_never_bind_across_each_other() {
    let engine = engine(vec![pair_rule()]);
    let mut tasks = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let flow = FlowId::from(format!("flow-{i}"));
            let value = format!("v{i}");
            engine
                .perform(ACT, record! { "p" => value.as_str() }, Some(flow.clone()))
                .await
                .unwrap();
            engine
                .perform(STEP, record! { "p" => value.as_str() }, Some(flow.clone()))
                .await
                .unwrap();
            (flow, value)
        }));
    }

    for task in tasks {
        let (flow, value) = task.await.unwrap();
        let done = inputs(&engine, &flow, &DONE);
        assert_eq!(done, vec![record! { "v" => value.as_str() }]);
    }
}

#[tokio::test]
async fn identical_values_in_other_flows_do_not_match() {
    let engine = engine(vec![pair_rule()]);
    let left = FlowId::from("left");
    let right = FlowId::from("right");
    engine
        .perform(ACT, record! { "p" => "same" }, Some(left.clone()))
        .await
        .unwrap();
    engine
        .perform(STEP, record! { "p" => "same" }, Some(right.clone()))
        .await
        .unwrap();

    assert!(inputs(&engine, &left, &DONE).is_empty());
    assert!(inputs(&engine, &right, &DONE).is_empty());
}

// =============================================================================
// Joins
// =============================================================================

#[tokio::test]
async fn empty_query_result_removes_exactly_that_frame() {
    let rule = SyncRule::define("Scores", |v| {
        let [user, score] = v.vars(["user", "score"]);
        SyncBody::new()
            .when(STEP, fields! {})
            .refine(
                Where::new()
                    .query(USERS, fields! {}, fields! { "user" => user })
                    .query(LOOKUP, fields! { "user" => user }, fields! { "score" => score }),
            )
            .then(DONE, fields! { "user" => user, "score" => score })
    });
    let engine = engine_with(vec![rule], &["al", "ghost", "bea"]);
    let flow = FlowId::from("join");
    engine
        .perform(STEP, Record::new(), Some(flow.clone()))
        .await
        .unwrap();

    let done = inputs(&engine, &flow, &DONE);
    assert_eq!(
        done,
        vec![
            record! { "user" => "al", "score" => 2 },
            record! { "user" => "bea", "score" => 3 },
        ]
    );
}

#[tokio::test]
async fn collected_empty_result_still_answers() {
    let rule = SyncRule::define("Roster", |v| {
        let [user, users] = v.vars(["user", "users"]);
        SyncBody::new()
            .when(STEP, fields! {})
            .refine(
                Where::new()
                    .query(USERS, fields! {}, fields! { "user" => user })
                    .collect_as([("user", user)], users),
            )
            .then(DONE, fields! { "users" => users })
    });
    let engine = engine_with(vec![rule], &[]);
    let flow = FlowId::from("none");
    engine
        .perform(STEP, Record::new(), Some(flow.clone()))
        .await
        .unwrap();

    let done = inputs(&engine, &flow, &DONE);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].get_list("users").map(|l| l.len()), Some(0));
}

#[tokio::test]
async fn failed_query_leaves_no_collected_frame() {
    let rule = SyncRule::define("Scores", |v| {
        let [user, score, scores] = v.vars(["user", "score", "scores"]);
        SyncBody::new()
            .when(STEP, fields! { "user" => user })
            .refine(
                Where::new()
                    .query(LOOKUP, fields! { "user" => user }, fields! { "score" => score })
                    .collect_as([("score", score)], scores),
            )
            .then(DONE, fields! { "user" => user, "scores" => scores })
    });
    let engine = engine(vec![rule]);
    let flow = FlowId::from("failing");
    for user in ["boom", "ghost"] {
        engine
            .perform(STEP, record! { "user" => user }, Some(flow.clone()))
            .await
            .unwrap();
    }

    let done = inputs(&engine, &flow, &DONE);
    assert_eq!(done.len(), 1);
    assert_eq!(str_field(&done[0], "user"), "ghost");
    assert_eq!(done[0].get_list("scores").map(|l| l.len()), Some(0));
}

#[test]
fn misspelled_where_query_rejected_at_startup() {
    let rule = SyncRule::define("Typo", |v| {
        let user = v.var("user");
        SyncBody::new()
            .when(STEP, fields! {})
            .refine(Where::new().query(
                QueryRef::new("Lab", "_usres"),
                fields! {},
                fields! { "user" => user },
            ))
            .then(DONE, fields! { "user" => user })
    });
    let Err(err) = SyncEngine::new(
        RuleRegistry::new(vec![rule]).unwrap(),
        ConceptRegistry::new().with(Lab::new(&[])),
        EngineConfig::default(),
    ) else {
        panic!("engine accepted a rule with an unknown query");
    };

    assert!(matches!(err.kind, ErrorKind::UnknownQuery { .. }));
    assert_eq!(err.context.and_then(|c| c.rule).as_deref(), Some("Typo"));
}

// =============================================================================
// Literals and variables
// =============================================================================

#[tokio::test]
async fn literal_patterns_never_coerce() {
    let rule = SyncRule::define("OnlyOne", |_| {
        SyncBody::new()
            .when(STEP, fields! { "n" => 1 })
            .then(DONE, fields! { "hit" => true })
    });
    let engine = engine(vec![rule]);
    let flow = FlowId::from("lit");
    for n in [Value::from("1"), Value::Float(1.0), Value::Bool(true), Value::Int(1)] {
        engine
            .perform(STEP, Record::new().with("n", n), Some(flow.clone()))
            .await
            .unwrap();
    }

    assert_eq!(inputs(&engine, &flow, &DONE).len(), 1);
}

#[tokio::test]
async fn shared_variable_must_agree_across_templates() {
    let engine = engine(vec![pair_rule()]);
    let flow = FlowId::from("vars");
    engine
        .perform(ACT, record! { "p" => "a" }, Some(flow.clone()))
        .await
        .unwrap();
    engine
        .perform(STEP, record! { "p" => "b" }, Some(flow.clone()))
        .await
        .unwrap();
    assert!(inputs(&engine, &flow, &DONE).is_empty());

    engine
        .perform(STEP, record! { "p" => "a" }, Some(flow.clone()))
        .await
        .unwrap();
    let done = inputs(&engine, &flow, &DONE);
    assert_eq!(done.len(), 1);
    assert_eq!(str_field(&done[0], "v"), "a");
}

// =============================================================================
// Depth guard
// =============================================================================

#[tokio::test]
async fn runaway_chain_faults_the_flow_and_stops() {
    let looping = SyncRule::define("Loop", |v| {
        let n = v.var("n");
        SyncBody::new()
            .when(STEP, fields! { "n" => n })
            .then(STEP, fields! { "n" => n })
    });
    let engine = SyncEngine::new(
        RuleRegistry::new(vec![looping]).unwrap(),
        ConceptRegistry::new().with(Lab::new(&[])),
        EngineConfig::default().with_max_chain_depth(5),
    )
    .unwrap();
    let flow = FlowId::from("loop");
    engine
        .perform(STEP, record! { "n" => 0 }, Some(flow.clone()))
        .await
        .unwrap();

    assert_eq!(inputs(&engine, &flow, &STEP).len(), 6);
    let faults = engine.faults(&flow);
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].rule.as_ref(), "Loop");
    assert!(matches!(
        faults[0].error.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxChainDepth { limit: 5, .. })
    ));
}
