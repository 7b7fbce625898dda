//! The application's synchronizations and bootstrap for Hatch.
//!
//! This crate provides:
//! - One module of [`SyncRule`]s per concept surface, plus read endpoints
//! - [`App`] - Concepts, rules and engine wired together behind `request`
//! - [`AppConfig`] - Aggregated configuration
//! - [`init_tracing`] - Subscriber setup for binaries and tests
//!
//! Request paths come in two flavours. Plain paths (`/Posting/create`)
//! take user ids directly. `/api/...` paths take a logging `session` and
//! resolve its owner before touching any concept.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod common;

pub mod accounts;
pub mod app;
pub mod commenting;
pub mod config;
pub mod files;
pub mod friending;
pub mod posting;
pub mod reads;
pub mod sessions;
pub mod telemetry;

pub use app::App;
pub use config::AppConfig;
pub use telemetry::init_tracing;

use hatch_engine::SyncRule;

/// Every rule the application registers, error responders first within
/// each endpoint.
#[must_use]
pub fn all_rules() -> Vec<SyncRule> {
    let mut rules = accounts::rules();
    rules.extend(friending::rules());
    rules.extend(posting::rules());
    rules.extend(commenting::rules());
    rules.extend(sessions::rules());
    rules.extend(files::rules());
    rules.extend(reads::rules());
    rules
}
