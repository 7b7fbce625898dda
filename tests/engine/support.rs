//! A small concept and helpers shared by the engine tests.

use async_trait::async_trait;
use hatch_engine::{
    Concept, ConceptRegistry, EngineConfig, Invocation, RuleRegistry, SyncEngine, SyncRule,
};
use hatch_foundation::{ActionRef, Error, FlowId, QueryRef, Record, Result, Value, record};

pub const ACT: ActionRef = ActionRef::new("Lab", "act");
pub const STEP: ActionRef = ActionRef::new("Lab", "step");
pub const NEXT: ActionRef = ActionRef::new("Lab", "next");
pub const DONE: ActionRef = ActionRef::new("Lab", "done");

/// `_users{} → [{user}]` over a fixed roster.
pub const USERS: QueryRef = QueryRef::new("Lab", "_users");
/// `_lookup{user} → [{score}]`; fails for `"boom"`, empty for `"ghost"`.
pub const LOOKUP: QueryRef = QueryRef::new("Lab", "_lookup");

/// `act` answers with its `reply` field (or `{}`); every other action
/// echoes its input.
pub struct Lab {
    roster: Vec<&'static str>,
}

impl Lab {
    pub fn new(roster: &[&'static str]) -> Self {
        Self {
            roster: roster.to_vec(),
        }
    }
}

#[async_trait]
impl Concept for Lab {
    fn name(&self) -> &'static str {
        "Lab"
    }

    fn actions(&self) -> &[&'static str] {
        &["act", "step", "next", "done"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_users", "_lookup"]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "act" => Ok(input.get_record("reply").cloned().unwrap_or_default()),
            _ => Ok(input),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_users" => Ok(self.roster.iter().map(|u| record! { "user" => *u }).collect()),
            "_lookup" => match input.require_str("user")? {
                "boom" => Err(Error::query_failed("Lab._lookup", "backend down")),
                "ghost" => Ok(Vec::new()),
                user => Ok(vec![record! { "score" => i64::try_from(user.len()).unwrap() }]),
            },
            _ => Err(Error::unknown_query("Lab", query)),
        }
    }
}

pub fn engine(rules: Vec<SyncRule>) -> SyncEngine {
    engine_with(rules, &["alice", "boom", "carol"])
}

pub fn engine_with(rules: Vec<SyncRule>, roster: &[&'static str]) -> SyncEngine {
    SyncEngine::new(
        RuleRegistry::new(rules).unwrap(),
        ConceptRegistry::new().with(Lab::new(roster)),
        EngineConfig::default().with_id_seed(7),
    )
    .unwrap()
}

/// Invocations of `action` in `flow`, in creation order.
pub fn invocations(engine: &SyncEngine, flow: &FlowId, action: &ActionRef) -> Vec<Invocation> {
    engine
        .log()
        .by_flow(flow)
        .into_iter()
        .filter(|i| i.action == *action)
        .collect()
}

/// Inputs of every `action` invocation in `flow`.
pub fn inputs(engine: &SyncEngine, flow: &FlowId, action: &ActionRef) -> Vec<Record> {
    invocations(engine, flow, action)
        .into_iter()
        .map(|i| i.input)
        .collect()
}

pub fn str_field(record: &Record, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.to_string(),
        other => panic!("{field} is not a string: {other:?}"),
    }
}
