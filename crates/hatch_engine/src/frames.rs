//! Frames: variable bindings for candidate matches.
//!
//! A [`Frame`] is one candidate match: pattern variables bound to values,
//! plus the invocations that produced it. [`Frames`] is an ordered relation
//! of frames that the where clause joins, filters, extends and aggregates.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hatch_foundation::{InvocationId, List, QueryRef, Record, Result, Value, Var, VarTable};
use tracing::warn;

use crate::pattern::{Fields, Term};

// =============================================================================
// Frame
// =============================================================================

/// One set of variable bindings.
///
/// Binding is monotonic: a variable bound once can only be confirmed, never
/// rebound to a different value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    bindings: im::OrdMap<Var, Value>,
    sources: im::Vector<InvocationId>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a bound value.
    #[must_use]
    pub fn get(&self, var: Var) -> Option<&Value> {
        self.bindings.get(&var)
    }

    /// Gets a bound string value.
    #[must_use]
    pub fn get_str(&self, var: Var) -> Option<&str> {
        self.get(var).and_then(Value::as_str)
    }

    /// Returns true if the variable is bound.
    #[must_use]
    pub fn is_bound(&self, var: Var) -> bool {
        self.bindings.contains_key(&var)
    }

    /// Binds or confirms a variable.
    ///
    /// Returns `None` if the variable is already bound to a different value.
    #[must_use]
    pub fn bind(&self, var: Var, value: Value) -> Option<Self> {
        match self.bindings.get(&var) {
            Some(existing) if *existing == value => Some(self.clone()),
            Some(_) => None,
            None => Some(Self {
                bindings: self.bindings.update(var, value),
                sources: self.sources.clone(),
            }),
        }
    }

    /// Returns a copy with `source` appended to the provenance.
    #[must_use]
    pub fn with_source(&self, source: InvocationId) -> Self {
        let mut sources = self.sources.clone();
        sources.push_back(source);
        Self {
            bindings: self.bindings.clone(),
            sources,
        }
    }

    /// Invocations that produced this frame, in template order.
    pub fn sources(&self) -> impl Iterator<Item = &InvocationId> {
        self.sources.iter()
    }

    /// Returns the number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (Var, &Value)> {
        self.bindings.iter().map(|(k, v)| (*k, v))
    }

    /// Renders bindings with variable names, for diagnostics.
    #[must_use]
    pub fn describe(&self, vars: &VarTable) -> String {
        let parts: Vec<String> = self
            .iter()
            .map(|(var, value)| format!("{} = {value:?}", vars.display(var)))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

// =============================================================================
// Query Source
// =============================================================================

/// Anything that can answer concept queries.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Runs a query. An empty result means no match.
    async fn query(&self, query: &QueryRef, input: Record) -> Result<Vec<Record>>;
}

// =============================================================================
// Frames
// =============================================================================

/// Ordered sequence of frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frames(Vec<Frame>);

impl Frames {
    /// Creates an empty frame set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame set with a single frame.
    #[must_use]
    pub fn single(frame: Frame) -> Self {
        Self(vec![frame])
    }

    /// Returns the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the frames.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.0.iter()
    }

    /// Appends a frame.
    pub fn push(&mut self, frame: Frame) {
        self.0.push(frame);
    }

    /// Dependent join against a query.
    ///
    /// For each frame, instantiates `input` from its bindings and runs the
    /// query; each result row whose fields unify with `output` yields one
    /// child frame. A frame with no rows is dropped. A frame whose input
    /// references an unbound variable, or whose query fails, is dropped with
    /// a warning; the remaining frames are unaffected.
    pub async fn query(
        self,
        source: &dyn QuerySource,
        query: &QueryRef,
        input: &Fields,
        output: &Fields,
        vars: &VarTable,
    ) -> Self {
        self.join(source, query, input, output, vars).await.frames
    }

    /// Like [`Frames::query`], but also counts the frames dropped because
    /// their input was unbound or their query failed.
    pub async fn join(
        self,
        source: &dyn QuerySource,
        query: &QueryRef,
        input: &Fields,
        output: &Fields,
        vars: &VarTable,
    ) -> Joined {
        let mut result = Vec::new();
        let mut failed = 0;
        for frame in self.0 {
            let record = match input.instantiate(&frame, vars) {
                Ok(record) => record,
                Err(e) => {
                    warn!(query = %query, error = %e, "query input not bound, dropping frame");
                    failed += 1;
                    continue;
                }
            };
            let rows = match source.query(query, record).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(query = %query, error = %e, "query failed, dropping frame");
                    failed += 1;
                    continue;
                }
            };
            for row in &rows {
                if let Some(child) = output.unify_record(&frame, row) {
                    result.push(child);
                }
            }
        }
        Joined {
            frames: Self(result),
            failed,
        }
    }

    /// Keeps only frames satisfying `predicate`.
    #[must_use]
    pub fn filter(self, predicate: impl Fn(&Frame) -> bool) -> Self {
        Self(self.0.into_iter().filter(|f| predicate(f)).collect())
    }

    /// Binds `var` to a value computed from each frame.
    ///
    /// Frames for which `derive` returns `None`, or whose existing binding
    /// of `var` disagrees, are dropped.
    #[must_use]
    pub fn derive(self, var: Var, derive: impl Fn(&Frame) -> Option<Value>) -> Self {
        Self(
            self.0
                .into_iter()
                .filter_map(|f| derive(&f).and_then(|v| f.bind(var, v)))
                .collect(),
        )
    }

    /// Groups frames and folds the `collected` variables into a list.
    ///
    /// Frames are grouped by their bindings of every variable not listed in
    /// `collected`. Each group becomes one frame binding `into` to a list of
    /// records, one per frame, with the given field names. Group order
    /// follows first appearance; provenance is the union of the group's.
    #[must_use]
    pub fn collect_as(self, collected: &[(Arc<str>, Var)], into: Var) -> Self {
        let is_collected = |var: Var| var == into || collected.iter().any(|(_, v)| *v == var);

        let mut order: Vec<BTreeMap<Var, Value>> = Vec::new();
        let mut groups: Vec<(Frame, Vec<Record>)> = Vec::new();
        for frame in self.0 {
            let key: BTreeMap<Var, Value> = frame
                .iter()
                .filter(|(var, _)| !is_collected(*var))
                .map(|(var, value)| (var, value.clone()))
                .collect();
            let row: Record = collected
                .iter()
                .filter_map(|(name, var)| frame.get(*var).map(|v| (name.clone(), v.clone())))
                .collect();

            if let Some(idx) = order.iter().position(|k| *k == key) {
                let (base, rows) = &mut groups[idx];
                for source in frame.sources() {
                    if !base.sources.iter().any(|s| s == source) {
                        base.sources.push_back(source.clone());
                    }
                }
                rows.push(row);
            } else {
                let base = Frame {
                    bindings: key.iter().map(|(k, v)| (*k, v.clone())).collect(),
                    sources: frame.sources.clone(),
                };
                order.push(key);
                groups.push((base, vec![row]));
            }
        }

        Self(
            groups
                .into_iter()
                .filter_map(|(base, rows)| {
                    let list: List = rows.into_iter().map(Value::Record).collect();
                    base.bind(into, Value::List(list))
                })
                .collect(),
        )
    }
}

/// Result of [`Frames::join`].
#[derive(Debug, Default)]
pub struct Joined {
    /// Frames extended by the query rows.
    pub frames: Frames,
    /// Frames dropped because the query could not run for them.
    pub failed: usize,
}

impl IntoIterator for Frames {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Frame> for Frames {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Frame>> for Frames {
    fn from(frames: Vec<Frame>) -> Self {
        Self(frames)
    }
}

/// Unifies a single term with a value, extending `frame`.
pub(crate) fn unify_term(frame: &Frame, term: &Term, value: &Value) -> Option<Frame> {
    match term {
        Term::Var(var) => frame.bind(*var, value.clone()),
        Term::Lit(lit) => (lit == value).then(|| frame.clone()),
    }
}
