//! Error types for the Hatch system.
//!
//! Uses `thiserror` for error definition. Business failures of a concept are
//! never errors: they are ordinary `{error}` output records. An [`Error`] means
//! the engine, a concept, or the rule configuration itself failed.

use std::fmt;

use thiserror::Error;

use crate::ids::{FlowId, InvocationId};
use crate::value::ValueKind;

/// The main error type for Hatch operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches (or extends) context naming the rule being evaluated.
    #[must_use]
    pub fn in_rule(mut self, rule: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_rule(rule));
        self
    }

    /// Creates an invocation not found error.
    #[must_use]
    pub fn invocation_not_found(id: InvocationId) -> Self {
        Self::new(ErrorKind::InvocationNotFound(id))
    }

    /// Creates an already completed error.
    #[must_use]
    pub fn already_completed(id: InvocationId) -> Self {
        Self::new(ErrorKind::AlreadyCompleted(id))
    }

    /// Creates an unknown concept error.
    #[must_use]
    pub fn unknown_concept(concept: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownConcept(concept.into()))
    }

    /// Creates an unknown action error.
    #[must_use]
    pub fn unknown_action(concept: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownAction {
            concept: concept.into(),
            action: action.into(),
        })
    }

    /// Creates an unknown query error.
    #[must_use]
    pub fn unknown_query(concept: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownQuery {
            concept: concept.into(),
            query: query.into(),
        })
    }

    /// Creates an unbound variable error.
    #[must_use]
    pub fn unbound_variable(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnboundVariable(name.into()))
    }

    /// Creates a duplicate rule error.
    #[must_use]
    pub fn duplicate_rule(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateRule(name.into()))
    }

    /// Creates an invalid input error for a missing or mistyped field.
    #[must_use]
    pub fn invalid_input(
        field: impl Into<String>,
        expected: ValueKind,
        actual: Option<ValueKind>,
    ) -> Self {
        Self::new(ErrorKind::InvalidInput {
            field: field.into(),
            expected,
            actual,
        })
    }

    /// Creates a query failed error.
    #[must_use]
    pub fn query_failed(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueryFailed {
            query: query.into(),
            message: message.into(),
        })
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout(what.into()))
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Codec(message.into()))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// No invocation with this id exists in the action log.
    #[error("invocation not found: {0}")]
    InvocationNotFound(InvocationId),

    /// The invocation already has an output.
    #[error("invocation already completed: {0}")]
    AlreadyCompleted(InvocationId),

    /// No concept with this name is registered.
    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    /// The concept does not declare this action.
    #[error("unknown action: {concept}.{action}")]
    UnknownAction {
        /// The concept name.
        concept: String,
        /// The action name.
        action: String,
    },

    /// The concept does not declare this query.
    #[error("unknown query: {concept}.{query}")]
    UnknownQuery {
        /// The concept name.
        concept: String,
        /// The query name.
        query: String,
    },

    /// A pattern variable was read before anything bound it.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// Two rules were registered under the same name.
    #[error("duplicate rule: {0}")]
    DuplicateRule(String),

    /// An input record field was missing or had the wrong kind.
    #[error("invalid input: field {field} expected {expected}{}", fmt_actual(*.actual))]
    InvalidInput {
        /// The field name.
        field: String,
        /// The kind the field must have.
        expected: ValueKind,
        /// The kind found, or `None` if the field was absent.
        actual: Option<ValueKind>,
    },

    /// A concept query failed.
    #[error("query {query} failed: {message}")]
    QueryFailed {
        /// The query that failed.
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// A wait timed out.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Audit snapshot encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn fmt_actual(actual: Option<ValueKind>) -> String {
    match actual {
        Some(kind) => format!(", got {kind}"),
        None => ", but it was missing".to_string(),
    }
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Chained invocation would exceed the configured chain depth.
    MaxChainDepth {
        /// The configured limit.
        limit: u32,
        /// The rule whose chaining was aborted.
        rule: Option<String>,
    },
    /// A rule produced more candidate matches than allowed in one pass.
    MaxMatches {
        /// The configured limit.
        limit: usize,
        /// The rule whose matching was cut off.
        rule: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxChainDepth { limit, rule } => {
                write!(f, "max chain depth ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " by rule {rule}")?;
                }
                Ok(())
            }
            Self::MaxMatches { limit, rule } => {
                write!(f, "max matches ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " by rule {rule}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule being evaluated.
    pub rule: Option<String>,
    /// Flow the error happened in.
    pub flow: Option<FlowId>,
    /// Chain of actions/queries leading to the error, outermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the flow.
    #[must_use]
    pub fn with_flow(mut self, flow: FlowId) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "in rule {rule}")?;
        }
        if let Some(flow) = &self.flow {
            write!(f, " (flow {flow})")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
