//! In-memory concept collaborators for Hatch.
//!
//! Each concept is an independent [`hatch_engine::Concept`]: it owns its
//! state, answers its own queries, and never calls another concept. The
//! application couples them with synchronization rules.
//!
//! - [`Requesting`] - Request/response correlation for the outer layer
//! - [`PasswordAuthentication`] - Username/password accounts
//! - [`Friending`] - Friend requests and friendships
//! - [`Posting`] - Posts with images and captions
//! - [`Commenting`] - Comments on posts
//! - [`SessionLogging`] - Logging sessions with image entries
//! - [`File`] - Upload/view URLs and file metadata, behind a [`UrlSigner`]
//!
//! Business failures are returned as `{error}` records; an `Err` from
//! `perform` is reserved for internal failures.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod commenting;
pub mod file;
pub mod friending;
pub mod password;
pub mod posting;
pub mod requesting;
pub mod sessions;

pub use commenting::Commenting;
pub use file::{File, FileConfig, SignMethod, SignRequest, UnsignedUrlSigner, UrlSigner};
pub use friending::Friending;
pub use password::PasswordAuthentication;
pub use posting::Posting;
pub use requesting::{Requesting, RequestingConfig};
pub use sessions::SessionLogging;

/// Milliseconds since the Unix epoch, used for `createdAt` fields.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
