//! Integration tests for Layer 1: Engine
//!
//! Tests matching, joins, chaining, idempotency and flow isolation against
//! a small in-test concept.

mod log;
mod properties;
mod support;
