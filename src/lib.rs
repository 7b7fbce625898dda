//! Hatch - Concept synchronization engine
//!
//! This crate re-exports all layers of the Hatch system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: hatch_syncs       — Application synchronizations, App bootstrap
//! Layer 2: hatch_concepts    — Concept collaborators (friending, posting, ...)
//! Layer 1: hatch_engine      — Action log, matcher, frames, chainer, registry
//! Layer 0: hatch_foundation  — Core types (Value, Record, Var, Error)
//! ```

pub use hatch_concepts as concepts;
pub use hatch_engine as engine;
pub use hatch_foundation as foundation;
pub use hatch_syncs as syncs;
