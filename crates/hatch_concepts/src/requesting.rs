//! Request/response correlation.
//!
//! The outer layer turns every inbound request into a `Requesting.request`
//! invocation. Rules eventually answer it with `Requesting.respond`, and the
//! caller waits on `_awaitResponse` for the first answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, QueryRef, Record, Result, record};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Default time a caller waits for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`Requesting`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestingConfig {
    /// How long `_awaitResponse` waits before failing with a timeout.
    pub response_timeout: Duration,
}

impl Default for RequestingConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl RequestingConfig {
    /// Sets the response timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

struct Pending {
    input: Record,
    response: Option<Record>,
    ready: Arc<Notify>,
}

/// The request concept.
pub struct Requesting {
    config: RequestingConfig,
    ids: IdMinter,
    requests: Mutex<HashMap<String, Pending>>,
}

impl Requesting {
    /// Concept name.
    pub const NAME: &'static str = "Requesting";
    /// `request(fields…) → {request}`
    pub const REQUEST: ActionRef = ActionRef::new(Self::NAME, "request");
    /// `respond({request, …}) → {request}`
    pub const RESPOND: ActionRef = ActionRef::new(Self::NAME, "respond");
    /// `_awaitResponse({request}) → [{response}]`
    pub const AWAIT_RESPONSE: QueryRef = QueryRef::new(Self::NAME, "_awaitResponse");

    /// Creates the concept.
    #[must_use]
    pub fn new(config: RequestingConfig) -> Self {
        Self::with_ids(config, IdMinter::from_entropy())
    }

    /// Creates the concept with a specific id source.
    #[must_use]
    pub fn with_ids(config: RequestingConfig, ids: IdMinter) -> Self {
        Self {
            config,
            ids,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the original input of a request.
    #[must_use]
    pub fn input(&self, request: &str) -> Option<Record> {
        self.requests.lock().get(request).map(|p| p.input.clone())
    }

    /// Returns the response to a request, if it has one.
    #[must_use]
    pub fn response(&self, request: &str) -> Option<Record> {
        self.requests
            .lock()
            .get(request)
            .and_then(|p| p.response.clone())
    }

    fn request(&self, input: Record) -> Record {
        let request = self.ids.uuid();
        debug!(request = %request, path = ?input.get_str("path"), "request received");
        self.requests.lock().insert(
            request.clone(),
            Pending {
                input,
                response: None,
                ready: Arc::new(Notify::new()),
            },
        );
        record! { "request" => request }
    }

    fn respond(&self, input: &Record) -> Record {
        let Some(request) = input.get_nonempty_str("request") else {
            return Record::error("Request ID must be provided.");
        };
        let mut requests = self.requests.lock();
        let Some(pending) = requests.get_mut(request) else {
            return Record::error(format!("Request {request} not found."));
        };
        if pending.response.is_some() {
            return Record::error(format!("Request {request} already has a response."));
        }
        pending.response = Some(input.without("request"));
        pending.ready.notify_waiters();
        debug!(request = %request, "request answered");
        record! { "request" => request }
    }

    async fn await_response(&self, input: &Record) -> Result<Record> {
        let request = input.require_str("request")?;
        let ready = {
            let requests = self.requests.lock();
            let pending = requests.get(request).ok_or_else(|| {
                Error::query_failed(
                    Self::AWAIT_RESPONSE.to_string(),
                    format!("request {request} not found"),
                )
            })?;
            if let Some(response) = &pending.response {
                return Ok(response.clone());
            }
            pending.ready.clone()
        };

        let deadline = tokio::time::Instant::now() + self.config.response_timeout;
        loop {
            let notified = ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(response) = self.response(request) {
                return Ok(response);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(Error::timeout(format!("response to request {request}")));
            }
        }
    }
}

impl Default for Requesting {
    fn default() -> Self {
        Self::new(RequestingConfig::default())
    }
}

#[async_trait]
impl Concept for Requesting {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["request", "respond"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_awaitResponse"]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "request" => Ok(self.request(input)),
            "respond" => Ok(self.respond(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_awaitResponse" => {
                let response = self.await_response(&input).await?;
                Ok(vec![record! { "response" => response }])
            }
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
