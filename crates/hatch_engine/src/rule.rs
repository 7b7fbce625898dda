//! Synchronization rules and the rule registry.
//!
//! A [`SyncRule`] is declared once at startup as a function of its pattern
//! variables. The [`RuleRegistry`] is immutable after it is built and indexes
//! rules by the actions their `when` clauses mention.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use hatch_foundation::{ActionRef, Error, Result, VarTable};

use crate::concept::ConceptRegistry;
use crate::pattern::{Fields, Then, When};
use crate::refine::Refine;

// =============================================================================
// Rule Body
// =============================================================================

/// The `{when, where, then}` body of a rule.
#[derive(Default)]
pub struct SyncBody {
    when: Vec<When>,
    refine: Option<Arc<dyn Refine>>,
    then: Vec<Then>,
}

impl SyncBody {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template matching an invocation as soon as it is invoked.
    #[must_use]
    pub fn when(mut self, action: ActionRef, input: Fields) -> Self {
        self.when.push(When::invoked(action, input));
        self
    }

    /// Adds a template matching a completed invocation.
    #[must_use]
    pub fn when_done(mut self, action: ActionRef, input: Fields, output: Fields) -> Self {
        self.when.push(When::completed(action, input, output));
        self
    }

    /// Adds a prebuilt template.
    #[must_use]
    pub fn with_when(mut self, template: When) -> Self {
        self.when.push(template);
        self
    }

    /// Sets the where clause.
    #[must_use]
    pub fn refine(mut self, refine: impl Refine + 'static) -> Self {
        self.refine = Some(Arc::new(refine));
        self
    }

    /// Adds an action to invoke for every surviving frame.
    #[must_use]
    pub fn then(mut self, action: ActionRef, input: Fields) -> Self {
        self.then.push(Then::invoke(action, input));
        self
    }
}

// =============================================================================
// Sync Rule
// =============================================================================

/// A declared synchronization rule.
#[derive(Clone)]
pub struct SyncRule {
    name: Arc<str>,
    vars: VarTable,
    when: Vec<When>,
    refine: Option<Arc<dyn Refine>>,
    then: Vec<Then>,
}

impl SyncRule {
    /// Declares a rule as a function of its pattern variables.
    ///
    /// ```ignore
    /// SyncRule::define("RemoveFriend", |v| {
    ///     let [request, user, friend] = v.vars(["request", "user", "friend"]);
    ///     SyncBody::new()
    ///         .when(Requesting::REQUEST, fields! { "path" => "/Friending/removeFriend",
    ///             "request" => request, "user" => user, "friend" => friend })
    ///         .then(Friending::REMOVE_FRIEND, fields! { "user" => user,
    ///             "to_be_removed_friend" => friend })
    /// })
    /// ```
    pub fn define(name: &str, body: impl FnOnce(&mut VarTable) -> SyncBody) -> Self {
        let mut vars = VarTable::new();
        let body = body(&mut vars);
        Self {
            name: name.into(),
            vars,
            when: body.when,
            refine: body.refine,
            then: body.then,
        }
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Returns the rule's variable table.
    #[must_use]
    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    /// Returns the `when` templates.
    #[must_use]
    pub fn when(&self) -> &[When] {
        &self.when
    }

    /// Returns the where clause, if any.
    #[must_use]
    pub fn refinement(&self) -> Option<&dyn Refine> {
        self.refine.as_deref()
    }

    /// Returns the `then` templates.
    #[must_use]
    pub fn then(&self) -> &[Then] {
        &self.then
    }

    /// Returns true if a `when` template mentions `action`.
    #[must_use]
    pub fn watches(&self, action: &ActionRef) -> bool {
        self.when.iter().any(|t| t.action == *action)
    }
}

impl fmt::Debug for SyncRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRule")
            .field("name", &self.name)
            .field("when", &self.when)
            .field("where", &self.refine.is_some())
            .field("then", &self.then)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Rule Registry
// =============================================================================

/// Immutable set of rules indexed by watched action.
#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<SyncRule>>,
    by_action: HashMap<ActionRef, Vec<usize>>,
}

impl RuleRegistry {
    /// Builds a registry.
    ///
    /// # Errors
    /// Returns `DuplicateRule` if two rules share a name.
    pub fn new(rules: impl IntoIterator<Item = SyncRule>) -> Result<Self> {
        let mut registry = Self::default();
        let mut names = HashSet::new();
        for rule in rules {
            if !names.insert(rule.name.clone()) {
                return Err(Error::duplicate_rule(rule.name.as_ref()));
            }
            let idx = registry.rules.len();
            let mut watched: Vec<&ActionRef> = rule.when.iter().map(|t| &t.action).collect();
            watched.dedup();
            for action in watched {
                let slots = registry.by_action.entry(action.clone()).or_default();
                if !slots.contains(&idx) {
                    slots.push(idx);
                }
            }
            registry.rules.push(Arc::new(rule));
        }
        Ok(registry)
    }

    /// Checks every referenced action and query against the concepts.
    ///
    /// # Errors
    /// Returns `UnknownConcept`, `UnknownAction` or `UnknownQuery` naming the
    /// first offending reference, with the rule as context.
    pub fn validate(&self, concepts: &ConceptRegistry) -> Result<()> {
        for rule in &self.rules {
            let actions = rule
                .when
                .iter()
                .map(|t| &t.action)
                .chain(rule.then.iter().map(|t| &t.action));
            for action in actions {
                concepts
                    .check_action(action)
                    .map_err(|e| e.in_rule(rule.name.as_ref()))?;
            }
            for query in rule.refine.iter().flat_map(|r| r.queries()) {
                concepts
                    .check_query(&query)
                    .map_err(|e| e.in_rule(rule.name.as_ref()))?;
            }
        }
        Ok(())
    }

    /// Rules whose `when` clause mentions `action`, in registration order.
    pub fn candidates(&self, action: &ActionRef) -> impl Iterator<Item = &Arc<SyncRule>> {
        self.by_action
            .get(action)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.rules.get(idx))
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<SyncRule>> {
        self.rules.iter().find(|r| r.name.as_ref() == name)
    }

    /// Iterates all rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SyncRule>> {
        self.rules.iter()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
