//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, Record, ids, variables and errors.

mod ids;
mod records;
mod values;
