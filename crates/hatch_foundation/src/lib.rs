//! Core types, values, records, and errors for Hatch.
//!
//! This crate provides:
//! - [`Value`] - The value type carried by action inputs, outputs, and query rows
//! - [`Record`] - Named-field records with structural sharing
//! - [`Var`] - Pattern variable handles, distinct from literal values
//! - [`ActionRef`], [`QueryRef`], [`InvocationId`], [`FlowId`] - Identities
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod ids;
pub mod value;
pub mod var;

pub use collections::{ERROR_FIELD, List, Record};
pub use error::{Error, ErrorContext, ErrorKind, SemanticLimit};
pub use ids::{ActionRef, FlowId, IdMinter, InvocationId, QueryRef};
pub use value::{Value, ValueKind};
pub use var::{Var, VarTable};

/// Result type alias using Hatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;
