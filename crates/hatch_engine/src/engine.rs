//! The synchronization engine: dispatch loop and chainer.
//!
//! Every log mutation becomes an event on an explicit work queue. For each
//! event the engine selects the rules watching the touched action, matches
//! them against the event's flow, refines the frames, claims the surviving
//! combinations and invokes the `then` actions, which queue further events.
//!
//! ```text
//! invoke/invoked ─▶ Event ─▶ candidates ─▶ Matcher ─▶ Refine ─▶ claim ─▶ then
//!                     ▲                                                  │
//!                     └────────────── Perform (run concept action) ◀─────┘
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use hatch_foundation::{
    ActionRef, Error, ErrorContext, FlowId, IdMinter, InvocationId, QueryRef, Record, Result,
    SemanticLimit,
};
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::concept::ConceptRegistry;
use crate::config::EngineConfig;
use crate::frames::{Frame, Frames, QuerySource};
use crate::log::{ActionLog, Cause, Fault, Invocation, NewInvocation};
use crate::pattern::{MatchExplanation, Matcher};
use crate::refine::RefineContext;
use crate::rule::{RuleRegistry, SyncRule};

/// A unit of dispatch work.
#[derive(Debug)]
enum Work {
    /// An invocation was appended or completed.
    Event(InvocationId),
    /// A chained invocation must be executed by its concept.
    Perform(InvocationId),
}

struct Inner {
    log: ActionLog,
    rules: RuleRegistry,
    concepts: ConceptRegistry,
    config: EngineConfig,
}

/// Cheaply cloneable handle to the engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    /// Builds an engine over a fixed set of rules and concepts.
    ///
    /// # Errors
    /// Returns a configuration error if a rule references an unknown
    /// concept, action or query.
    pub fn new(rules: RuleRegistry, concepts: ConceptRegistry, config: EngineConfig) -> Result<Self> {
        rules.validate(&concepts)?;
        let log = ActionLog::new(IdMinter::new(config.id_seed));
        Ok(Self {
            inner: Arc::new(Inner {
                log,
                rules,
                concepts,
                config,
            }),
        })
    }

    /// Returns the action log.
    #[must_use]
    pub fn log(&self) -> &ActionLog {
        &self.inner.log
    }

    /// Returns the rule registry.
    #[must_use]
    pub fn rules(&self) -> &RuleRegistry {
        &self.inner.rules
    }

    /// Returns the concept registry.
    #[must_use]
    pub fn concepts(&self) -> &ConceptRegistry {
        &self.inner.concepts
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the faults recorded for a flow.
    #[must_use]
    pub fn faults(&self, flow: &FlowId) -> Vec<Fault> {
        self.inner.log.faults(flow)
    }

    // =========================================================================
    // Core Surface
    // =========================================================================

    /// Records an invocation and runs every rule it triggers.
    ///
    /// The concept action itself is not executed; complete it with
    /// [`SyncEngine::invoked`].
    ///
    /// # Errors
    /// Returns an error if the supplied flow already holds the minted id.
    pub async fn invoke(
        &self,
        action: ActionRef,
        input: Record,
        flow: Option<FlowId>,
    ) -> Result<InvocationId> {
        let invocation = self
            .inner
            .log
            .append(NewInvocation::new(action, input).with_flow(flow))?;
        self.drain(VecDeque::from([Work::Event(invocation.id.clone())]))
            .await;
        Ok(invocation.id)
    }

    /// Completes an invocation and runs every rule it triggers.
    ///
    /// # Errors
    /// Returns `InvocationNotFound` or `AlreadyCompleted`.
    pub async fn invoked(&self, id: &InvocationId, output: Record) -> Result<InvocationId> {
        let invocation = self.inner.log.invoked(id, output)?;
        self.drain(VecDeque::from([Work::Event(invocation.id.clone())]))
            .await;
        Ok(invocation.id)
    }

    /// Invokes an action, runs it, completes it, and runs every rule
    /// triggered along the way. Returns the invocation id and its output.
    ///
    /// An internal concept failure completes the invocation with
    /// `{error: message}`, which is returned like any business error.
    ///
    /// # Errors
    /// Returns an error if the action is not registered.
    pub async fn perform(
        &self,
        action: ActionRef,
        input: Record,
        flow: Option<FlowId>,
    ) -> Result<(InvocationId, Record)> {
        self.inner.concepts.check_action(&action)?;
        let invocation = self
            .inner
            .log
            .append(NewInvocation::new(action, input).with_flow(flow))?;
        let id = invocation.id;
        self.drain(VecDeque::from([
            Work::Event(id.clone()),
            Work::Perform(id.clone()),
        ]))
        .await;
        let output = self
            .inner
            .log
            .get(&id)
            .and_then(|inv| inv.output)
            .ok_or_else(|| Error::internal(format!("invocation {id} left incomplete")))?;
        Ok((id, output))
    }

    /// Runs a concept query.
    ///
    /// # Errors
    /// Returns an error for unknown queries or failing concepts.
    pub async fn query(&self, query: &QueryRef, input: Record) -> Result<Vec<Record>> {
        QuerySource::query(&self.inner.concepts, query, input).await
    }

    /// Explains each `when` template of a rule against one invocation.
    ///
    /// # Errors
    /// Returns an error if the rule or the invocation does not exist.
    pub fn explain(&self, rule: &str, id: &InvocationId) -> Result<Vec<MatchExplanation>> {
        let rule = self
            .inner
            .rules
            .get(rule)
            .ok_or_else(|| Error::internal(format!("no rule named {rule}")))?;
        let invocation = self
            .inner
            .log
            .get(id)
            .ok_or_else(|| Error::invocation_not_found(id.clone()))?;
        Ok(rule
            .when()
            .iter()
            .map(|t| Matcher::explain(t, &invocation))
            .collect())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    async fn drain(&self, mut queue: VecDeque<Work>) {
        while let Some(work) = queue.pop_front() {
            match work {
                Work::Event(id) => self.on_event(&id, &mut queue).await,
                Work::Perform(id) => self.run_action(&id, &mut queue).await,
            }
        }
    }

    async fn run_action(&self, id: &InvocationId, queue: &mut VecDeque<Work>) {
        let Some(invocation) = self.inner.log.get(id) else {
            error!(id = %id, "queued action vanished from the log");
            return;
        };
        let output = match self
            .inner
            .concepts
            .perform(&invocation.action, invocation.input.clone())
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(action = %invocation.action, id = %id, error = %e, "action failed internally");
                Record::error(e.to_string())
            }
        };
        if self.inner.log.invoked(id, output).is_ok() {
            queue.push_back(Work::Event(id.clone()));
        }
    }

    async fn on_event(&self, id: &InvocationId, queue: &mut VecDeque<Work>) {
        let Some(trigger) = self.inner.log.get(id) else {
            error!(id = %id, "event for unknown invocation");
            return;
        };
        for rule in self.inner.rules.candidates(&trigger.action) {
            if self.inner.log.is_aborted(&trigger.flow, rule.name()) {
                continue;
            }
            let span = debug_span!("rule", rule = %rule.name(), flow = %trigger.flow);
            self.evaluate(rule, &trigger, queue).instrument(span).await;
        }
    }

    async fn evaluate(&self, rule: &SyncRule, trigger: &Invocation, queue: &mut VecDeque<Work>) {
        let flow = &trigger.flow;
        let invocations = self.inner.log.by_flow(flow);
        let synced = self.inner.log.synced_for(flow, rule.name());

        let matched = Matcher::new(rule.when())
            .with_anchor(&trigger.id)
            .excluding(&synced)
            .with_limit(self.inner.config.max_matches_per_rule)
            .for_rule(rule.name())
            .run(&invocations);
        let frames = match matched {
            Ok(frames) if frames.is_empty() => return,
            Ok(frames) => Frames::from(frames),
            Err(e) => {
                error!(error = %e, "matching aborted");
                return;
            }
        };

        let frames = match rule.refinement() {
            Some(refine) => {
                let cx = RefineContext {
                    source: &self.inner.concepts,
                    vars: rule.vars(),
                    rule: rule.name(),
                    flow,
                };
                refine.refine(frames, &cx).await
            }
            None => frames,
        };
        if frames.is_empty() {
            return;
        }

        let (combos, groups) = group_by_sources(frames);
        let claimed = self.inner.log.claim(flow, rule.name(), &combos);
        let depths: HashMap<&InvocationId, u32> =
            invocations.iter().map(|inv| (&inv.id, inv.depth)).collect();

        for ((combo, frames), won) in combos.iter().zip(groups).zip(claimed) {
            if !won {
                debug!("combination already synced");
                continue;
            }
            let depth = combo
                .iter()
                .filter_map(|id| depths.get(id).copied())
                .max()
                .unwrap_or(0)
                + 1;
            if depth > self.inner.config.max_chain_depth {
                let err = Error::limit_exceeded(SemanticLimit::MaxChainDepth {
                    limit: self.inner.config.max_chain_depth,
                    rule: Some(rule.name().to_string()),
                })
                .with_context(
                    ErrorContext::new()
                        .with_rule(rule.name().as_ref())
                        .with_flow(flow.clone()),
                );
                error!(error = %err, "chain depth exceeded, aborting rule for this flow");
                self.inner.log.abort_rule(
                    flow,
                    Fault {
                        rule: rule.name().clone(),
                        invocation: trigger.id.clone(),
                        error: err,
                    },
                );
                return;
            }
            for frame in &frames {
                self.chain(rule, frame, combo, depth, flow, queue);
            }
        }
    }

    fn chain(
        &self,
        rule: &SyncRule,
        frame: &Frame,
        combo: &[InvocationId],
        depth: u32,
        flow: &FlowId,
        queue: &mut VecDeque<Work>,
    ) {
        for then in rule.then() {
            let input = match then.input.instantiate(frame, rule.vars()) {
                Ok(input) => input,
                Err(e) => {
                    warn!(action = %then.action, error = %e, "then input not bound, skipping action");
                    continue;
                }
            };
            let cause = Cause {
                rule: rule.name().clone(),
                sources: combo.to_vec(),
            };
            let new = NewInvocation::new(then.action.clone(), input)
                .with_flow(Some(flow.clone()))
                .with_cause(cause, depth);
            match self.inner.log.append(new) {
                Ok(invocation) => {
                    debug!(action = %then.action, id = %invocation.id, depth, "rule fired");
                    queue.push_back(Work::Event(invocation.id.clone()));
                    queue.push_back(Work::Perform(invocation.id));
                }
                Err(e) => error!(action = %then.action, error = %e, "chained invoke failed"),
            }
        }
    }
}

/// Groups frames by their source combination, in first-appearance order.
fn group_by_sources(frames: Frames) -> (Vec<Vec<InvocationId>>, Vec<Vec<Frame>>) {
    let mut index: HashMap<Vec<InvocationId>, usize> = HashMap::new();
    let mut combos = Vec::new();
    let mut groups: Vec<Vec<Frame>> = Vec::new();
    for frame in frames {
        let key: Vec<InvocationId> = frame.sources().cloned().collect();
        if let Some(&idx) = index.get(&key) {
            groups[idx].push(frame);
        } else {
            index.insert(key.clone(), combos.len());
            combos.push(key);
            groups.push(vec![frame]);
        }
    }
    (combos, groups)
}
