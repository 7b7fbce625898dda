//! Application configuration.

use std::time::Duration;

use hatch_concepts::{FileConfig, RequestingConfig};
use hatch_engine::EngineConfig;

/// Everything [`crate::App`] needs to start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Engine limits and id seed.
    pub engine: EngineConfig,
    /// Request/response correlation.
    pub requesting: RequestingConfig,
    /// Bucket and URL settings for uploads.
    pub file: FileConfig,
}

impl AppConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the bucket taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            file: FileConfig::from_env(),
            ..Self::default()
        }
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Replaces the file configuration.
    #[must_use]
    pub fn with_file(mut self, file: FileConfig) -> Self {
        self.file = file;
        self
    }

    /// Sets how long a request waits for its response.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.requesting = self.requesting.with_response_timeout(timeout);
        self
    }

    /// Seeds every id minter for reproducible runs.
    #[must_use]
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.engine = self.engine.with_id_seed(seed);
        self
    }
}
