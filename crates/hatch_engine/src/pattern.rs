//! Action patterns and the unification matcher.
//!
//! A rule's `when` clause is a list of [`When`] templates. The [`Matcher`]
//! finds every combination of distinct invocations from one flow that
//! satisfies all templates with consistent variable bindings.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use hatch_foundation::{
    ActionRef, Error, InvocationId, List, Record, Result, SemanticLimit, Value, Var, VarTable,
};

use crate::frames::{Frame, unify_term};
use crate::log::Invocation;

// =============================================================================
// Terms and Fields
// =============================================================================

/// A field term: a pattern variable or a literal value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// Binds on first occurrence, must be equal on later ones.
    Var(Var),
    /// Must equal the stored value exactly.
    Lit(Value),
}

impl From<Var> for Term {
    fn from(var: Var) -> Self {
        Self::Var(var)
    }
}

macro_rules! literal_terms {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Term {
                fn from(value: $ty) -> Self {
                    Self::Lit(Value::from(value))
                }
            }
        )*
    };
}

literal_terms!(Value, &str, String, Arc<str>, bool, i64, i32, f64, Record, List);

/// Named-field pattern: field name to [`Term`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields(Vec<(Arc<str>, Term)>);

impl Fields {
    /// Creates an empty pattern (matches any record).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, field: impl Into<Arc<str>>, term: impl Into<Term>) -> Self {
        self.0.push((field.into(), term.into()));
        self
    }

    /// Iterates (field, term) pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.0.iter().map(|(k, t)| (k.as_ref(), t))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the pattern names no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variables referenced by this pattern.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.iter().filter_map(|(_, t)| match t {
            Term::Var(v) => Some(*v),
            Term::Lit(_) => None,
        })
    }

    /// Builds a record by substituting bound variables.
    ///
    /// # Errors
    /// Returns `UnboundVariable` if a variable has no binding in `frame`.
    pub fn instantiate(&self, frame: &Frame, vars: &VarTable) -> Result<Record> {
        let mut record = Record::new();
        for (field, term) in &self.0 {
            let value = match term {
                Term::Lit(v) => v.clone(),
                Term::Var(var) => frame
                    .get(*var)
                    .cloned()
                    .ok_or_else(|| Error::unbound_variable(vars.display(*var)))?,
            };
            record.set(field.clone(), value);
        }
        Ok(record)
    }

    /// Unifies every field with `record`, extending `frame`.
    ///
    /// Fields named by the pattern must exist in the record; fields of the
    /// record not named by the pattern are ignored.
    #[must_use]
    pub fn unify_record(&self, frame: &Frame, record: &Record) -> Option<Frame> {
        let mut frame = frame.clone();
        for (field, term) in &self.0 {
            frame = unify_term(&frame, term, record.get(field)?)?;
        }
        Some(frame)
    }

    fn explain_record(
        &self,
        frame: &Frame,
        record: &Record,
        side: Side,
    ) -> std::result::Result<Frame, MatchFailure> {
        let mut frame = frame.clone();
        for (field, term) in &self.0 {
            let Some(actual) = record.get(field) else {
                return Err(MatchFailure::MissingField {
                    side,
                    field: field.to_string(),
                });
            };
            match term {
                Term::Lit(expected) if expected != actual => {
                    return Err(MatchFailure::ValueMismatch {
                        side,
                        field: field.to_string(),
                        expected: expected.clone(),
                        actual: actual.clone(),
                    });
                }
                Term::Lit(_) => {}
                Term::Var(var) => match frame.bind(*var, actual.clone()) {
                    Some(next) => frame = next,
                    None => {
                        return Err(MatchFailure::UnificationFailure {
                            side,
                            field: field.to_string(),
                            var: *var,
                            expected: frame.get(*var).cloned().unwrap_or(Value::Nil),
                            actual: actual.clone(),
                        });
                    }
                },
            }
        }
        Ok(frame)
    }
}

/// Builds [`Fields`] from `"field" => term` pairs.
///
/// Terms are pattern variables or anything convertible to a literal value.
#[macro_export]
macro_rules! fields {
    () => { $crate::Fields::new() };
    ($($field:expr => $term:expr),+ $(,)?) => {
        $crate::Fields::new()$(.with($field, $term))+
    };
}

// =============================================================================
// Templates
// =============================================================================

/// One `when` template: an action with input and output patterns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct When {
    /// The action identity to match.
    pub action: ActionRef,
    /// Pattern over the invocation input.
    pub input: Fields,
    /// Pattern over the output. `None` matches as soon as the action is
    /// invoked; `Some` matches only completed invocations.
    pub output: Option<Fields>,
}

impl When {
    /// Matches an invocation whether or not it has completed.
    #[must_use]
    pub fn invoked(action: ActionRef, input: Fields) -> Self {
        Self {
            action,
            input,
            output: None,
        }
    }

    /// Matches a completed invocation whose output satisfies `output`.
    ///
    /// An empty `output` pattern matches any output, error-shaped included.
    #[must_use]
    pub fn completed(action: ActionRef, input: Fields, output: Fields) -> Self {
        Self {
            action,
            input,
            output: Some(output),
        }
    }
}

/// One `then` template: an action to invoke with substituted input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Then {
    /// The action to invoke.
    pub action: ActionRef,
    /// Input pattern; every variable must be bound when it fires.
    pub input: Fields,
}

impl Then {
    /// Creates a `then` template.
    #[must_use]
    pub fn invoke(action: ActionRef, input: Fields) -> Self {
        Self { action, input }
    }
}

// =============================================================================
// Match Explanation
// =============================================================================

/// Which side of an invocation a pattern field belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The input record.
    Input,
    /// The output record.
    Output,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Reason an invocation failed to satisfy a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchFailure {
    /// Different concept or action.
    ActionMismatch {
        /// The action the template wants.
        expected: ActionRef,
        /// The action invoked.
        actual: ActionRef,
    },
    /// The template needs an output and the invocation has none yet.
    Pending,
    /// A field named by the pattern is absent.
    MissingField {
        /// Input or output.
        side: Side,
        /// The missing field.
        field: String,
    },
    /// A literal did not equal the stored value.
    ValueMismatch {
        /// Input or output.
        side: Side,
        /// The field compared.
        field: String,
        /// The literal in the pattern.
        expected: Value,
        /// The stored value.
        actual: Value,
    },
    /// A variable was already bound to a different value.
    UnificationFailure {
        /// Input or output.
        side: Side,
        /// The field compared.
        field: String,
        /// The variable.
        var: Var,
        /// The existing binding.
        expected: Value,
        /// The conflicting stored value.
        actual: Value,
    },
}

/// Result of explaining a single template against a single invocation.
#[derive(Clone, Debug)]
pub struct MatchExplanation {
    /// Did it match?
    pub matched: bool,
    /// Why not, if it didn't.
    pub failure: Option<MatchFailure>,
    /// Bindings on success, or the bindings given on failure.
    pub bindings: Frame,
}

// =============================================================================
// Matcher
// =============================================================================

/// Default kill switch for candidate combinations per rule evaluation.
pub const DEFAULT_MAX_MATCHES: usize = 10_000;

/// Unifies `when` templates against one flow's invocations.
pub struct Matcher<'a> {
    templates: &'a [When],
    anchor: Option<&'a InvocationId>,
    excluded: Option<&'a HashSet<InvocationId>>,
    limit: usize,
    rule: Option<&'a str>,
}

impl<'a> Matcher<'a> {
    /// Creates a matcher for a rule's `when` clause.
    #[must_use]
    pub fn new(templates: &'a [When]) -> Self {
        Self {
            templates,
            anchor: None,
            excluded: None,
            limit: DEFAULT_MAX_MATCHES,
            rule: None,
        }
    }

    /// Only yields combinations that include `anchor`.
    #[must_use]
    pub fn with_anchor(mut self, anchor: &'a InvocationId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Skips every combination with a member in `excluded`.
    #[must_use]
    pub fn excluding(mut self, excluded: &'a HashSet<InvocationId>) -> Self {
        self.excluded = Some(excluded);
        self
    }

    /// Sets the kill switch on the number of combinations.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Names the rule, for limit errors.
    #[must_use]
    pub fn for_rule(mut self, rule: &'a str) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Finds every satisfying combination, in template then creation order.
    ///
    /// Each combination yields one frame whose sources are the matched
    /// invocations in template order. Assignments that only permute the
    /// same invocations into the same bindings count once.
    ///
    /// # Errors
    /// Returns `LimitExceeded(MaxMatches)` when more than the configured
    /// number of combinations is found.
    pub fn run(&self, invocations: &[Invocation]) -> Result<Vec<Frame>> {
        if self.templates.is_empty() {
            return Ok(Vec::new());
        }
        let excluded = |id: &InvocationId| self.excluded.is_some_and(|set| set.contains(id));
        if self.anchor.is_some_and(excluded) {
            return Ok(Vec::new());
        }
        let candidates: Vec<&Invocation> =
            invocations.iter().filter(|inv| !excluded(&inv.id)).collect();

        let mut used = Vec::with_capacity(self.templates.len());
        let mut out = Vec::new();
        self.extend(0, &Frame::new(), &candidates, &mut used, &mut out)?;
        Ok(out)
    }

    fn extend(
        &self,
        idx: usize,
        frame: &Frame,
        candidates: &[&Invocation],
        used: &mut Vec<usize>,
        out: &mut Vec<Frame>,
    ) -> Result<()> {
        let Some(template) = self.templates.get(idx) else {
            if self
                .anchor
                .is_none_or(|anchor| frame.sources().any(|s| s == anchor))
            {
                if out.len() >= self.limit {
                    return Err(Error::limit_exceeded(SemanticLimit::MaxMatches {
                        limit: self.limit,
                        rule: self.rule.map(ToString::to_string),
                    }));
                }
                if !out.iter().any(|seen| same_combination(seen, frame)) {
                    out.push(frame.clone());
                }
            }
            return Ok(());
        };

        for (i, invocation) in candidates.iter().enumerate() {
            if used.contains(&i) {
                continue;
            }
            if let Some(next) = Self::unify(template, invocation, frame) {
                used.push(i);
                let next = next.with_source(invocation.id.clone());
                let result = self.extend(idx + 1, &next, candidates, used, out);
                used.pop();
                result?;
            }
        }
        Ok(())
    }

    /// Unifies one template with one invocation, extending `frame`.
    #[must_use]
    pub fn unify(template: &When, invocation: &Invocation, frame: &Frame) -> Option<Frame> {
        Self::check(template, invocation, frame).ok()
    }

    /// Explains why `invocation` does or does not satisfy `template`.
    #[must_use]
    pub fn explain(template: &When, invocation: &Invocation) -> MatchExplanation {
        Self::explain_with(template, invocation, &Frame::new())
    }

    /// Like [`Matcher::explain`], starting from existing bindings.
    #[must_use]
    pub fn explain_with(template: &When, invocation: &Invocation, frame: &Frame) -> MatchExplanation {
        match Self::check(template, invocation, frame) {
            Ok(bindings) => MatchExplanation {
                matched: true,
                failure: None,
                bindings,
            },
            Err(failure) => MatchExplanation {
                matched: false,
                failure: Some(failure),
                bindings: frame.clone(),
            },
        }
    }

    fn check(
        template: &When,
        invocation: &Invocation,
        frame: &Frame,
    ) -> std::result::Result<Frame, MatchFailure> {
        if template.action != invocation.action {
            return Err(MatchFailure::ActionMismatch {
                expected: template.action.clone(),
                actual: invocation.action.clone(),
            });
        }
        let frame = template
            .input
            .explain_record(frame, &invocation.input, Side::Input)?;
        match (&template.output, &invocation.output) {
            (None, _) => Ok(frame),
            (Some(_), None) => Err(MatchFailure::Pending),
            (Some(pattern), Some(output)) => pattern.explain_record(&frame, output, Side::Output),
        }
    }
}

/// Same member set and same bindings, regardless of template order.
fn same_combination(a: &Frame, b: &Frame) -> bool {
    fn members(f: &Frame) -> Vec<&InvocationId> {
        let mut ids: Vec<&InvocationId> = f.sources().collect();
        ids.sort();
        ids
    }
    a.iter().eq(b.iter()) && members(a) == members(b)
}
