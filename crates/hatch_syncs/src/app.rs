//! Application bootstrap.
//!
//! [`App`] registers every concept, builds the rule registry from
//! [`crate::all_rules`], and turns a request path plus fields into the
//! response some rule eventually gives it.

use std::sync::Arc;

use hatch_concepts::{
    Commenting, File, Friending, PasswordAuthentication, Posting, Requesting, SessionLogging,
    UnsignedUrlSigner, UrlSigner,
};
use hatch_engine::{ConceptRegistry, RuleRegistry, SyncEngine};
use hatch_foundation::{Error, FlowId, IdMinter, Record, Result, record};
use tracing::{debug, info};

use crate::config::AppConfig;

/// The wired application.
#[derive(Clone)]
pub struct App {
    engine: SyncEngine,
}

impl App {
    /// Builds the application with unsigned upload URLs.
    ///
    /// # Errors
    /// Returns an error if a rule references an unregistered action.
    pub fn new(config: AppConfig) -> Result<Self> {
        let signer = Arc::new(UnsignedUrlSigner::new(config.file.public_base_url.clone()));
        Self::with_signer(config, signer)
    }

    /// Builds the application around a URL signer.
    ///
    /// # Errors
    /// Returns an error if a rule references an unregistered action.
    pub fn with_signer(config: AppConfig, signer: Arc<dyn UrlSigner>) -> Result<Self> {
        let seed = config.engine.id_seed;
        // One id stream per concept.
        let ids = |stream: u64| IdMinter::new(seed.map(|s| s.wrapping_add(stream)));

        let concepts = ConceptRegistry::new()
            .with(Requesting::with_ids(config.requesting.clone(), ids(1)))
            .with(PasswordAuthentication::with_ids(ids(2)))
            .with(Friending::with_ids(ids(3)))
            .with(Posting::with_ids(ids(4)))
            .with(Commenting::with_ids(ids(5)))
            .with(SessionLogging::with_ids(ids(6)))
            .with(File::with_ids(config.file.clone(), signer, ids(7)));

        let rules = RuleRegistry::new(crate::all_rules())?;
        info!(
            concepts = concepts.len(),
            rules = rules.len(),
            "application ready"
        );
        let engine = SyncEngine::new(rules, concepts, config.engine)?;
        Ok(Self { engine })
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Sends a request on `path` and waits for its response.
    ///
    /// The response is returned as given to `Requesting.respond`, which
    /// includes business errors as `{error}`.
    ///
    /// # Errors
    /// Returns `Timeout` if no rule answers in time.
    pub async fn request(&self, path: &str, fields: Record) -> Result<Record> {
        self.request_in_flow(path, fields, None)
            .await
            .map(|(_, response)| response)
    }

    /// Like [`App::request`], running in `flow` when given, and returning
    /// the flow the request ran in.
    ///
    /// # Errors
    /// Returns `Timeout` if no rule answers in time.
    pub async fn request_in_flow(
        &self,
        path: &str,
        fields: Record,
        flow: Option<FlowId>,
    ) -> Result<(FlowId, Record)> {
        let input = fields.with("path", path);
        let (id, output) = self
            .engine
            .perform(Requesting::REQUEST, input, flow)
            .await?;
        let request = output
            .get_str("request")
            .ok_or_else(|| Error::internal("request produced no id"))?
            .to_string();
        let flow = self
            .engine
            .log()
            .get(&id)
            .map(|inv| inv.flow)
            .ok_or_else(|| Error::invocation_not_found(id.clone()))?;
        debug!(path, request = %request, flow = %flow, "awaiting response");

        let rows = self
            .engine
            .query(&Requesting::AWAIT_RESPONSE, record! { "request" => request })
            .await?;
        let response = rows
            .first()
            .and_then(|row| row.get_record("response"))
            .cloned()
            .ok_or_else(|| Error::internal("response missing from await"))?;
        Ok((flow, response))
    }
}
