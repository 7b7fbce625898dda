//! Where-clause evaluation.
//!
//! A rule's `where` clause is any [`Refine`] implementation. [`Where`] is the
//! declarative one: an ordered pipeline of query, filter, derive and collect
//! steps, run per matched frame.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hatch_foundation::{FlowId, List, QueryRef, Value, Var, VarTable};

use crate::frames::{Frame, Frames, QuerySource};
use crate::pattern::Fields;

/// What a refinement can see besides the frames themselves.
pub struct RefineContext<'a> {
    /// Answers concept queries.
    pub source: &'a dyn QuerySource,
    /// The rule's variable names, for diagnostics.
    pub vars: &'a VarTable,
    /// Name of the rule being evaluated.
    pub rule: &'a str,
    /// Flow being evaluated.
    pub flow: &'a FlowId,
}

/// Asynchronous `Frames -> Frames` refinement.
///
/// Implementations isolate their own failures: a failing query drops the
/// affected frames and never aborts the whole refinement.
#[async_trait]
pub trait Refine: Send + Sync {
    /// Refines the frames produced by the matcher.
    async fn refine(&self, frames: Frames, cx: &RefineContext<'_>) -> Frames;

    /// Concept queries this refinement may run, checked at registration.
    fn queries(&self) -> Vec<QueryRef> {
        Vec::new()
    }
}

type Predicate = Arc<dyn Fn(&Frame) -> bool + Send + Sync>;
type Derivation = Arc<dyn Fn(&Frame) -> Option<Value> + Send + Sync>;

#[derive(Clone)]
enum Step {
    Query {
        query: QueryRef,
        input: Fields,
        output: Fields,
    },
    Filter(Predicate),
    Derive {
        var: Var,
        derive: Derivation,
    },
    Collect {
        fields: Vec<(Arc<str>, Var)>,
        into: Var,
    },
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query { query, .. } => write!(f, "Query({query})"),
            Self::Filter(_) => write!(f, "Filter"),
            Self::Derive { var, .. } => write!(f, "Derive({var:?})"),
            Self::Collect { into, .. } => write!(f, "Collect({into:?})"),
        }
    }
}

/// Declarative where clause.
///
/// ```ignore
/// Where::new()
///     .query(Friending::IS_FRIENDS, fields! { "user1" => author, "user2" => owner },
///            fields! { "areFriends" => friends })
///     .filter(move |f| f.get(friends) == Some(&Value::Bool(true)))
/// ```
#[derive(Clone, Debug, Default)]
pub struct Where {
    steps: Vec<Step>,
}

impl Where {
    /// Creates an empty pipeline (passes frames through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependent join against a concept query.
    ///
    /// Output terms bind variables from each result row; output literals
    /// must equal the row's value.
    #[must_use]
    pub fn query(mut self, query: QueryRef, input: Fields, output: Fields) -> Self {
        self.steps.push(Step::Query {
            query,
            input,
            output,
        });
        self
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&Frame) -> bool + Send + Sync + 'static) -> Self {
        self.steps.push(Step::Filter(Arc::new(predicate)));
        self
    }

    /// Adds a derived binding; frames where `derive` yields `None` are dropped.
    #[must_use]
    pub fn derive(
        mut self,
        var: Var,
        derive: impl Fn(&Frame) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(Step::Derive {
            var,
            derive: Arc::new(derive),
        });
        self
    }

    /// Folds the listed variables into a list of records bound to `into`.
    ///
    /// When no frames reach this step, the matched frame itself survives
    /// with `into` bound to an empty list, unless an earlier query failed
    /// for it; then the matched frame is dropped.
    #[must_use]
    pub fn collect_as<N: Into<Arc<str>>>(
        mut self,
        fields: impl IntoIterator<Item = (N, Var)>,
        into: Var,
    ) -> Self {
        self.steps.push(Step::Collect {
            fields: fields.into_iter().map(|(n, v)| (n.into(), v)).collect(),
            into,
        });
        self
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    async fn run_one(&self, origin: Frame, cx: &RefineContext<'_>) -> Frames {
        let mut frames = Frames::single(origin.clone());
        let mut failed = false;
        for step in &self.steps {
            frames = match step {
                Step::Query {
                    query,
                    input,
                    output,
                } => {
                    let joined = frames.join(cx.source, query, input, output, cx.vars).await;
                    failed |= joined.failed > 0;
                    joined.frames
                }
                Step::Filter(predicate) => frames.filter(|f| predicate(f)),
                Step::Derive { var, derive } => frames.derive(*var, |f| derive(f)),
                Step::Collect { fields, into } => {
                    if !frames.is_empty() {
                        frames.collect_as(fields, *into)
                    } else if failed {
                        return Frames::new();
                    } else {
                        origin
                            .bind(*into, Value::List(List::new()))
                            .into_iter()
                            .collect()
                    }
                }
            };
        }
        frames
    }
}

#[async_trait]
impl Refine for Where {
    async fn refine(&self, frames: Frames, cx: &RefineContext<'_>) -> Frames {
        let mut out = Frames::new();
        for origin in frames {
            for frame in self.run_one(origin, cx).await {
                out.push(frame);
            }
        }
        out
    }

    fn queries(&self) -> Vec<QueryRef> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Query { query, .. } => Some(query.clone()),
                _ => None,
            })
            .collect()
    }
}
