//! The concept calling convention and the startup concept registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hatch_foundation::{ActionRef, Error, ErrorContext, QueryRef, Record, Result};

use crate::frames::QuerySource;

/// An independently implemented domain module.
///
/// Actions take a named-field record and return either a success record or
/// a business-error record `{error}`; an `Err` is reserved for internal
/// failures. Queries are pure and always return a sequence of records.
#[async_trait]
pub trait Concept: Send + Sync {
    /// The concept name used in action and query references.
    fn name(&self) -> &'static str;

    /// Names of the actions this concept performs.
    fn actions(&self) -> &[&'static str];

    /// Names of the queries this concept answers.
    fn queries(&self) -> &[&'static str];

    /// Performs an action.
    async fn perform(&self, action: &str, input: Record) -> Result<Record>;

    /// Runs a query. An empty result means no match.
    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>>;
}

/// Concepts by name, built once at startup.
#[derive(Clone, Default)]
pub struct ConceptRegistry {
    concepts: HashMap<&'static str, Arc<dyn Concept>>,
}

impl ConceptRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a concept, replacing any concept of the same name.
    #[must_use]
    pub fn with(mut self, concept: impl Concept + 'static) -> Self {
        self.register(Arc::new(concept));
        self
    }

    /// Adds a shared concept.
    pub fn register(&mut self, concept: Arc<dyn Concept>) {
        self.concepts.insert(concept.name(), concept);
    }

    /// Looks up a concept.
    ///
    /// # Errors
    /// Returns `UnknownConcept` if none is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Concept>> {
        self.concepts
            .get(name)
            .ok_or_else(|| Error::unknown_concept(name))
    }

    /// Verifies that the concept exists and declares the action.
    ///
    /// # Errors
    /// Returns `UnknownConcept` or `UnknownAction`.
    pub fn check_action(&self, action: &ActionRef) -> Result<()> {
        let concept = self.get(action.concept())?;
        if concept.actions().iter().any(|a| *a == action.action()) {
            Ok(())
        } else {
            Err(Error::unknown_action(action.concept(), action.action()))
        }
    }

    /// Verifies that the concept exists and declares the query.
    ///
    /// # Errors
    /// Returns `UnknownConcept` or `UnknownQuery`.
    pub fn check_query(&self, query: &QueryRef) -> Result<()> {
        let concept = self.get(query.concept())?;
        if concept.queries().iter().any(|q| *q == query.query()) {
            Ok(())
        } else {
            Err(Error::unknown_query(query.concept(), query.query()))
        }
    }

    /// Runs a concept action.
    ///
    /// # Errors
    /// Returns an error for unknown references or internal concept failures.
    pub async fn perform(&self, action: &ActionRef, input: Record) -> Result<Record> {
        self.check_action(action)?;
        let concept = self.get(action.concept())?;
        concept
            .perform(action.action(), input)
            .await
            .map_err(|e| e.with_context(ErrorContext::new().with_frame(action.to_string())))
    }

    /// Returns the registered concept names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.concepts.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of concepts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Returns true if no concepts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

#[async_trait]
impl QuerySource for ConceptRegistry {
    async fn query(&self, query: &QueryRef, input: Record) -> Result<Vec<Record>> {
        self.check_query(query)?;
        let concept = self.get(query.concept())?;
        concept.query(query.query(), input).await
    }
}

impl fmt::Debug for ConceptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConceptRegistry")
            .field("concepts", &self.names())
            .finish()
    }
}
