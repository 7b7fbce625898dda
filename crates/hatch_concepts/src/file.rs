//! File uploads to an object store bucket.
//!
//! The concept hands out time-limited upload and view URLs and records file
//! metadata once an upload is confirmed. Producing the URLs is delegated to
//! a [`UrlSigner`]; [`UnsignedUrlSigner`] is the reference implementation
//! and performs no cryptographic signing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, QueryRef, Record, Result, record};
use im::OrdMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::now_millis;

/// Environment variable naming the bucket.
pub const BUCKET_ENV: &str = "GCS_BUCKET";
/// Default public base URL for confirmed uploads.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://storage.googleapis.com";
/// Longest expiry a signed URL may carry (seven days).
pub const MAX_EXPIRY_SECONDS: u32 = 604_800;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for [`File`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileConfig {
    /// Bucket holding uploads; actions fail while this is unset.
    pub bucket: Option<String>,
    /// Base of the public URL returned by `confirmUpload`.
    pub public_base_url: String,
    /// Upload URL expiry when the caller supplies none, in seconds.
    pub default_upload_expiry: u32,
    /// View URL expiry when the caller supplies none, in seconds.
    pub default_view_expiry: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            default_upload_expiry: 900,
            default_view_expiry: 300,
        }
    }
}

impl FileConfig {
    /// Reads the bucket from `GCS_BUCKET`; everything else takes defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let bucket = std::env::var(BUCKET_ENV)
            .ok()
            .filter(|b| !b.trim().is_empty());
        Self {
            bucket,
            ..Self::default()
        }
    }

    /// Sets the bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the public base URL.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self
    }

    /// Sets the default upload and view expiries.
    #[must_use]
    pub fn with_default_expiry(mut self, upload: u32, view: u32) -> Self {
        self.default_upload_expiry = upload;
        self.default_view_expiry = view;
        self
    }
}

// =============================================================================
// URL Signing
// =============================================================================

/// HTTP method a signed URL grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignMethod {
    /// Download.
    Get,
    /// Upload.
    Put,
    /// Metadata.
    Head,
    /// Removal.
    Delete,
}

impl fmt::Display for SignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
        };
        f.write_str(method)
    }
}

/// One signing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignRequest {
    /// Granted method.
    pub method: SignMethod,
    /// Target bucket.
    pub bucket: String,
    /// Object path inside the bucket.
    pub object: String,
    /// Lifetime of the URL.
    pub expires_in_seconds: u32,
}

/// Produces time-limited URLs for object access.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// Returns a URL granting `request.method` on the object.
    async fn sign(&self, request: &SignRequest) -> Result<String>;
}

/// Builds plain URLs carrying the method and expiry as query parameters.
#[derive(Clone, Debug)]
pub struct UnsignedUrlSigner {
    base_url: String,
}

impl UnsignedUrlSigner {
    /// Creates a signer rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for UnsignedUrlSigner {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_BASE_URL)
    }
}

#[async_trait]
impl UrlSigner for UnsignedUrlSigner {
    async fn sign(&self, request: &SignRequest) -> Result<String> {
        Ok(format!(
            "{}/{}/{}?method={}&expires={}",
            self.base_url.trim_end_matches('/'),
            request.bucket,
            request.object,
            request.method,
            request.expires_in_seconds,
        ))
    }
}

// =============================================================================
// Concept
// =============================================================================

#[derive(Clone, Debug)]
struct StoredFile {
    owner: String,
    bucket: String,
    object: String,
    content_type: Option<String>,
    size: Option<i64>,
    created_at: i64,
}

impl StoredFile {
    fn to_record(&self, id: &str) -> Record {
        let mut row = record! {
            "file" => id,
            "owner" => self.owner.as_str(),
            "bucket" => self.bucket.as_str(),
            "object" => self.object.as_str(),
            "createdAt" => self.created_at,
        };
        if let Some(content_type) = &self.content_type {
            row.set("contentType", content_type.as_str());
        }
        if let Some(size) = self.size {
            row.set("size", size);
        }
        row
    }
}

/// The file concept.
pub struct File {
    config: FileConfig,
    signer: Arc<dyn UrlSigner>,
    ids: IdMinter,
    files: RwLock<OrdMap<String, StoredFile>>,
}

impl File {
    /// Concept name.
    pub const NAME: &'static str = "File";
    /// `requestUploadUrl{user, filename, contentType?, expiresInSeconds?} → {uploadUrl, bucket, object}`
    pub const REQUEST_UPLOAD_URL: ActionRef = ActionRef::new(Self::NAME, "requestUploadUrl");
    /// `confirmUpload{user, object, contentType?, size?} → {file, url}`
    pub const CONFIRM_UPLOAD: ActionRef = ActionRef::new(Self::NAME, "confirmUpload");
    /// `getViewUrl{user, object, expiresInSeconds?} → {url}`
    pub const GET_VIEW_URL: ActionRef = ActionRef::new(Self::NAME, "getViewUrl");
    /// `_getFileById{file} → [{file, owner, bucket, object, …}]`
    pub const GET_FILE_BY_ID: QueryRef = QueryRef::new(Self::NAME, "_getFileById");
    /// `_getFilesByOwner{user} → [{file, owner, bucket, object, …}]`
    pub const GET_FILES_BY_OWNER: QueryRef = QueryRef::new(Self::NAME, "_getFilesByOwner");

    /// Creates the concept with a signer.
    #[must_use]
    pub fn new(config: FileConfig, signer: Arc<dyn UrlSigner>) -> Self {
        Self::with_ids(config, signer, IdMinter::from_entropy())
    }

    /// Creates the concept with the [`UnsignedUrlSigner`].
    #[must_use]
    pub fn unsigned(config: FileConfig) -> Self {
        let signer = Arc::new(UnsignedUrlSigner::new(config.public_base_url.clone()));
        Self::new(config, signer)
    }

    /// Creates the concept with a specific id source.
    #[must_use]
    pub fn with_ids(config: FileConfig, signer: Arc<dyn UrlSigner>, ids: IdMinter) -> Self {
        Self {
            config,
            signer,
            ids,
            files: RwLock::new(OrdMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    fn bucket(&self) -> std::result::Result<&str, Record> {
        self.config
            .bucket
            .as_deref()
            .ok_or_else(|| Record::error(format!("{BUCKET_ENV} env var is required")))
    }

    fn expiry(input: &Record, default: u32) -> u32 {
        input
            .get_int("expiresInSeconds")
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(default)
            .clamp(1, MAX_EXPIRY_SECONDS)
    }

    /// Checks the bucket and the `user` plus `field` inputs every action needs.
    fn preconditions<'a>(
        &'a self,
        input: &'a Record,
        field: &str,
    ) -> std::result::Result<(&'a str, &'a str, &'a str), Record> {
        let bucket = self.bucket()?;
        let user = input
            .get_nonempty_str("user")
            .ok_or_else(|| Record::error("User ID must be provided."))?;
        let value = input
            .get_nonempty_str(field)
            .ok_or_else(|| Record::error(format!("{field} is required")))?;
        Ok((bucket, user, value))
    }

    async fn request_upload_url(&self, input: &Record) -> Result<Record> {
        let (bucket, user, filename) = match self.preconditions(input, "filename") {
            Ok(checked) => checked,
            Err(error) => return Ok(error),
        };
        let object = format!("{user}/{}-{}", now_millis(), sanitize(filename));
        let request = SignRequest {
            method: SignMethod::Put,
            bucket: bucket.to_string(),
            object: object.clone(),
            expires_in_seconds: Self::expiry(input, self.config.default_upload_expiry),
        };
        let upload_url = self.signer.sign(&request).await?;
        debug!(user, object = %object, "upload url issued");
        Ok(record! { "uploadUrl" => upload_url, "bucket" => bucket, "object" => object })
    }

    fn confirm_upload(&self, input: &Record) -> Record {
        let (bucket, user, object) = match self.preconditions(input, "object") {
            Ok(checked) => checked,
            Err(error) => return error,
        };
        let file = self.ids.uuid();
        let stored = StoredFile {
            owner: user.to_string(),
            bucket: bucket.to_string(),
            object: object.to_string(),
            content_type: input.get_nonempty_str("contentType").map(str::to_string),
            size: input.get_int("size"),
            created_at: now_millis(),
        };
        self.files.write().insert(file.clone(), stored);
        let url = format!(
            "{}/{bucket}/{object}",
            self.config.public_base_url.trim_end_matches('/')
        );
        debug!(file = %file, user, "upload confirmed");
        record! { "file" => file, "url" => url }
    }

    async fn get_view_url(&self, input: &Record) -> Result<Record> {
        let (bucket, _, object) = match self.preconditions(input, "object") {
            Ok(checked) => checked,
            Err(error) => return Ok(error),
        };
        let request = SignRequest {
            method: SignMethod::Get,
            bucket: bucket.to_string(),
            object: object.to_string(),
            expires_in_seconds: Self::expiry(input, self.config.default_view_expiry),
        };
        let url = self.signer.sign(&request).await?;
        Ok(record! { "url" => url })
    }

    fn files_where(&self, keep: impl Fn(&str, &StoredFile) -> bool) -> Vec<Record> {
        let files = self.files.read();
        let mut rows: Vec<_> = files.iter().filter(|(id, f)| keep(id, f)).collect();
        rows.sort_by_key(|(_, f)| f.created_at);
        rows.into_iter().map(|(id, f)| f.to_record(id)).collect()
    }
}

/// Reduces a filename to `[A-Za-z0-9._-]`, collapsing every run of other
/// characters into a single `-`.
fn sanitize(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    let mut gap = false;
    for c in filename.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            if gap {
                out.push('-');
                gap = false;
            }
            out.push(c);
        } else {
            gap = !out.is_empty();
        }
    }
    if out.is_empty() {
        out.push_str("file");
    }
    out
}

#[async_trait]
impl Concept for File {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["requestUploadUrl", "confirmUpload", "getViewUrl"]
    }

    fn queries(&self) -> &[&'static str] {
        &["_getFileById", "_getFilesByOwner"]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "requestUploadUrl" => self.request_upload_url(&input).await,
            "confirmUpload" => Ok(self.confirm_upload(&input)),
            "getViewUrl" => self.get_view_url(&input).await,
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_getFileById" => {
                let file = input.require_str("file")?;
                Ok(self.files_where(|id, _| id == file))
            }
            "_getFilesByOwner" => {
                let user = input.require_str("user")?;
                Ok(self.files_where(|_, f| f.owner == user))
            }
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
