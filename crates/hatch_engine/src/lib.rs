//! Action log, pattern unification, refinement, and chaining for Hatch.
//!
//! This crate provides:
//! - [`ActionLog`] - Append-only, flow-partitioned invocation log
//! - [`Matcher`] - Unification of `when` templates against one flow
//! - [`Frames`] / [`Where`] - Dependent joins, filters and aggregation
//! - [`RuleRegistry`] / [`SyncRule`] - Declared synchronizations
//! - [`SyncEngine`] - Dispatch loop, chainer and depth guard

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod concept;
pub mod config;
pub mod engine;
pub mod frames;
pub mod log;
pub mod pattern;
pub mod refine;
pub mod rule;

pub use concept::{Concept, ConceptRegistry};
pub use config::{DEFAULT_MAX_CHAIN_DEPTH, EngineConfig};
pub use engine::SyncEngine;
pub use frames::{Frame, Frames, Joined, QuerySource};
pub use log::{ActionLog, Cause, Fault, Invocation, NewInvocation};
pub use pattern::{
    DEFAULT_MAX_MATCHES, Fields, MatchExplanation, MatchFailure, Matcher, Side, Term, Then, When,
};
pub use refine::{Refine, RefineContext, Where};
pub use rule::{RuleRegistry, SyncBody, SyncRule};
