//! Engine configuration.

use crate::pattern::DEFAULT_MAX_MATCHES;

/// Default bound on chain depth.
pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 32;

/// Tuning knobs and kill switches for a [`crate::SyncEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Chained invocations deeper than this abort the offending rule for
    /// the flow.
    pub max_chain_depth: u32,
    /// Kill switch on candidate combinations per rule evaluation.
    pub max_matches_per_rule: usize,
    /// Seed for id minting; `None` seeds from OS entropy.
    pub id_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            max_matches_per_rule: DEFAULT_MAX_MATCHES,
            id_seed: None,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain depth bound.
    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: u32) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Sets the per-rule match kill switch.
    #[must_use]
    pub fn with_max_matches_per_rule(mut self, max: usize) -> Self {
        self.max_matches_per_rule = max;
        self
    }

    /// Seeds id minting for reproducible ids.
    #[must_use]
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }
}
