//! Integration tests for Layer 2: Concepts
//!
//! Drives each in-memory concept through a [`hatch_engine::ConceptRegistry`],
//! the same seam the engine uses.

mod files;
mod requesting;
mod sessions;
mod support;
