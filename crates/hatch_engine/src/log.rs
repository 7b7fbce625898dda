//! The action log: an append-only record of action invocations.
//!
//! Invocations are partitioned by flow. Each partition sits behind its own
//! mutex inside a concurrent map, so unrelated flows never contend. Synced
//! markers (which rule already fired for which invocation) and flow faults
//! live in the partition too, outside the invocation records themselves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use hatch_foundation::{ActionRef, Error, FlowId, IdMinter, InvocationId, Record, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

// =============================================================================
// Invocation
// =============================================================================

/// Why a chained invocation exists: the rule that fired and the invocations
/// whose combination satisfied it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    /// Name of the rule that fired.
    pub rule: Arc<str>,
    /// Invocations that made up the satisfying combination.
    pub sources: Vec<InvocationId>,
}

/// One recorded action invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique id.
    pub id: InvocationId,
    /// The action invoked.
    pub action: ActionRef,
    /// Input record, fixed at creation.
    pub input: Record,
    /// Output record; `None` until the invocation completes.
    pub output: Option<Record>,
    /// Flow (logical request) this invocation belongs to.
    pub flow: FlowId,
    /// Creation position within the flow.
    pub seq: u64,
    /// Chain depth; 0 for externally started invocations.
    pub depth: u32,
    /// Provenance for chained invocations.
    pub cause: Option<Cause>,
}

impl Invocation {
    /// Returns true once the output has been recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.output.is_some()
    }
}

/// Parameters for appending an invocation.
#[derive(Clone, Debug)]
pub struct NewInvocation {
    action: ActionRef,
    input: Record,
    flow: Option<FlowId>,
    id: Option<InvocationId>,
    depth: u32,
    cause: Option<Cause>,
}

impl NewInvocation {
    /// Creates a top-level invocation of `action`.
    #[must_use]
    pub fn new(action: ActionRef, input: Record) -> Self {
        Self {
            action,
            input,
            flow: None,
            id: None,
            depth: 0,
            cause: None,
        }
    }

    /// Places the invocation in an existing flow.
    #[must_use]
    pub fn with_flow(mut self, flow: Option<FlowId>) -> Self {
        self.flow = flow;
        self
    }

    /// Uses a caller-supplied id.
    #[must_use]
    pub fn with_id(mut self, id: InvocationId) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks the invocation as chained from a rule firing.
    #[must_use]
    pub fn with_cause(mut self, cause: Cause, depth: u32) -> Self {
        self.cause = Some(cause);
        self.depth = depth;
        self
    }
}

/// A flow-level defect: a rule aborted for the rest of the flow.
#[derive(Clone, Debug)]
pub struct Fault {
    /// The aborted rule.
    pub rule: Arc<str>,
    /// The invocation being processed when the rule was aborted.
    pub invocation: InvocationId,
    /// What went wrong.
    pub error: Error,
}

// =============================================================================
// Flow Partition
// =============================================================================

#[derive(Debug, Default)]
struct FlowPartition {
    invocations: Vec<Invocation>,
    by_id: HashMap<InvocationId, usize>,
    synced: HashSet<(Arc<str>, InvocationId)>,
    faults: Vec<Fault>,
    aborted: HashSet<Arc<str>>,
}

impl FlowPartition {
    fn get_mut(&mut self, id: &InvocationId) -> Option<&mut Invocation> {
        let idx = *self.by_id.get(id)?;
        self.invocations.get_mut(idx)
    }

    fn is_synced(&self, rule: &Arc<str>, id: &InvocationId) -> bool {
        self.synced.contains(&(rule.clone(), id.clone()))
    }
}

/// Snapshot of one flow's audit trail, as exported.
#[derive(Debug, Serialize, Deserialize)]
struct FlowSnapshot {
    flow: FlowId,
    invocations: Vec<Invocation>,
}

// =============================================================================
// Action Log
// =============================================================================

/// Append-only store of action invocations, indexed by id and by flow.
#[derive(Debug)]
pub struct ActionLog {
    flows: DashMap<FlowId, Arc<Mutex<FlowPartition>>>,
    index: DashMap<InvocationId, FlowId>,
    ids: IdMinter,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(IdMinter::default())
    }
}

impl ActionLog {
    /// Creates an empty log minting ids with `ids`.
    #[must_use]
    pub fn new(ids: IdMinter) -> Self {
        Self {
            flows: DashMap::new(),
            index: DashMap::new(),
            ids,
        }
    }

    fn partition(&self, flow: &FlowId) -> Option<Arc<Mutex<FlowPartition>>> {
        self.flows.get(flow).map(|p| Arc::clone(p.value()))
    }

    fn partition_of(&self, id: &InvocationId) -> Option<Arc<Mutex<FlowPartition>>> {
        let flow = self.index.get(id)?.value().clone();
        self.partition(&flow)
    }

    /// Records a new invocation with no output.
    ///
    /// Mints an id and/or a flow when none is given.
    ///
    /// # Errors
    /// Returns an internal error if the supplied id is already in use.
    pub fn append(&self, new: NewInvocation) -> Result<Invocation> {
        let id = new.id.unwrap_or_else(|| self.ids.invocation());
        let flow = new.flow.unwrap_or_else(|| self.ids.flow());

        match self.index.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(Error::internal(format!("duplicate invocation id {id}")));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(flow.clone());
            }
        }

        let partition = Arc::clone(self.flows.entry(flow.clone()).or_default().value());
        let mut partition = partition.lock();
        let next = partition.invocations.len();
        let invocation = Invocation {
            id: id.clone(),
            action: new.action,
            input: new.input,
            output: None,
            flow,
            seq: next as u64,
            depth: new.depth,
            cause: new.cause,
        };
        partition.by_id.insert(id, next);
        partition.invocations.push(invocation.clone());

        debug!(
            action = %invocation.action,
            id = %invocation.id,
            flow = %invocation.flow,
            depth = invocation.depth,
            "invoke"
        );
        Ok(invocation)
    }

    /// Records a top-level invocation and returns its id.
    ///
    /// # Errors
    /// Returns an internal error if the supplied id is already in use.
    pub fn invoke(
        &self,
        action: ActionRef,
        input: Record,
        flow: Option<FlowId>,
        id: Option<InvocationId>,
    ) -> Result<InvocationId> {
        let mut new = NewInvocation::new(action, input).with_flow(flow);
        if let Some(id) = id {
            new = new.with_id(id);
        }
        self.append(new).map(|inv| inv.id)
    }

    /// Sets the output of an invocation.
    ///
    /// # Errors
    /// Returns `InvocationNotFound` for an unknown id and `AlreadyCompleted`
    /// if the output was already set. Both are logged at error level.
    pub fn invoked(&self, id: &InvocationId, output: Record) -> Result<Invocation> {
        let Some(partition) = self.partition_of(id) else {
            error!(id = %id, "completion for unknown invocation");
            return Err(Error::invocation_not_found(id.clone()));
        };
        let mut partition = partition.lock();
        let Some(invocation) = partition.get_mut(id) else {
            error!(id = %id, "completion for unknown invocation");
            return Err(Error::invocation_not_found(id.clone()));
        };
        if invocation.output.is_some() {
            error!(id = %id, action = %invocation.action, "invocation completed twice");
            return Err(Error::already_completed(id.clone()));
        }
        invocation.output = Some(output);
        debug!(
            action = %invocation.action,
            id = %id,
            output = %invocation.output.as_ref().map(ToString::to_string).unwrap_or_default(),
            "invoked"
        );
        Ok(invocation.clone())
    }

    /// Looks up a single invocation.
    #[must_use]
    pub fn get(&self, id: &InvocationId) -> Option<Invocation> {
        let partition = self.partition_of(id)?;
        let partition = partition.lock();
        let idx = *partition.by_id.get(id)?;
        partition.invocations.get(idx).cloned()
    }

    /// Returns a flow's invocations in creation order.
    #[must_use]
    pub fn by_flow(&self, flow: &FlowId) -> Vec<Invocation> {
        self.partition(flow)
            .map(|p| p.lock().invocations.clone())
            .unwrap_or_default()
    }

    /// Returns every known flow id.
    #[must_use]
    pub fn flows(&self) -> Vec<FlowId> {
        self.flows.iter().map(|e| e.key().clone()).collect()
    }

    /// Returns the total number of invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the ids in `flow` already marked synced for `rule`.
    #[must_use]
    pub fn synced_for(&self, flow: &FlowId, rule: &Arc<str>) -> HashSet<InvocationId> {
        self.partition(flow)
            .map(|p| {
                p.lock()
                    .synced
                    .iter()
                    .filter(|(r, _)| r == rule)
                    .map(|(_, id)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true if `id` is marked synced for `rule`.
    #[must_use]
    pub fn is_synced(&self, rule: &Arc<str>, id: &InvocationId) -> bool {
        self.partition_of(id)
            .is_some_and(|p| p.lock().is_synced(rule, id))
    }

    /// Atomically claims combinations for `rule`.
    ///
    /// Every combination is checked against the markers as they stood when
    /// the call started; then all members of the accepted combinations are
    /// marked. Returns one flag per combination.
    pub fn claim(
        &self,
        flow: &FlowId,
        rule: &Arc<str>,
        combinations: &[Vec<InvocationId>],
    ) -> Vec<bool> {
        let Some(partition) = self.partition(flow) else {
            return vec![false; combinations.len()];
        };
        let mut partition = partition.lock();
        let accepted: Vec<bool> = combinations
            .iter()
            .map(|combo| !combo.iter().any(|id| partition.is_synced(rule, id)))
            .collect();
        for (combo, ok) in combinations.iter().zip(&accepted) {
            if *ok {
                for id in combo {
                    partition.synced.insert((rule.clone(), id.clone()));
                }
            }
        }
        accepted
    }

    /// Aborts `rule` for the rest of the flow and records the fault.
    pub fn abort_rule(&self, flow: &FlowId, fault: Fault) {
        if let Some(partition) = self.partition(flow) {
            let mut partition = partition.lock();
            partition.aborted.insert(fault.rule.clone());
            partition.faults.push(fault);
        }
    }

    /// Returns true if `rule` was aborted in `flow`.
    #[must_use]
    pub fn is_aborted(&self, flow: &FlowId, rule: &Arc<str>) -> bool {
        self.partition(flow)
            .is_some_and(|p| p.lock().aborted.contains(rule))
    }

    /// Returns the faults recorded for a flow.
    #[must_use]
    pub fn faults(&self, flow: &FlowId) -> Vec<Fault> {
        self.partition(flow)
            .map(|p| p.lock().faults.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Audit Export
    // =========================================================================

    /// Serializes one flow's invocations to `MessagePack`.
    ///
    /// # Errors
    /// Returns a codec error if encoding fails.
    pub fn export_flow(&self, flow: &FlowId) -> Result<Vec<u8>> {
        let snapshot = FlowSnapshot {
            flow: flow.clone(),
            invocations: self.by_flow(flow),
        };
        rmp_serde::to_vec_named(&snapshot).map_err(|e| Error::codec(e.to_string()))
    }

    /// Loads a flow exported by [`ActionLog::export_flow`].
    ///
    /// # Errors
    /// Returns a codec error for malformed input and an internal error if
    /// the flow or any of its invocation ids is already present.
    pub fn import(&self, bytes: &[u8]) -> Result<FlowId> {
        let snapshot: FlowSnapshot =
            rmp_serde::from_slice(bytes).map_err(|e| Error::codec(e.to_string()))?;
        if self.flows.contains_key(&snapshot.flow) {
            return Err(Error::internal(format!(
                "flow {} already present",
                snapshot.flow
            )));
        }
        if let Some(dup) = snapshot
            .invocations
            .iter()
            .find(|inv| self.index.contains_key(&inv.id))
        {
            return Err(Error::internal(format!("duplicate invocation id {}", dup.id)));
        }

        let mut partition = FlowPartition::default();
        for (idx, invocation) in snapshot.invocations.into_iter().enumerate() {
            self.index
                .insert(invocation.id.clone(), snapshot.flow.clone());
            partition.by_id.insert(invocation.id.clone(), idx);
            partition.invocations.push(invocation);
        }
        self.flows
            .insert(snapshot.flow.clone(), Arc::new(Mutex::new(partition)));
        Ok(snapshot.flow)
    }
}
