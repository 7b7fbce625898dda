//! Uploaded files.

use hatch_concepts::{File, Requesting, SessionLogging};
use hatch_engine::{SyncBody, SyncRule, Where, fields};

use crate::common::{forward, request_on, respond_error, respond_with};

/// Plain upload-URL path.
pub const REQUEST_UPLOAD_URL: &str = "/File/requestUploadUrl";
/// Plain confirmation path.
pub const CONFIRM_UPLOAD: &str = "/File/confirmUpload";
/// Plain view-URL path.
pub const GET_VIEW_URL: &str = "/File/getViewUrl";
/// Session-authenticated upload-URL path.
pub const API_REQUEST_UPLOAD_URL: &str = "/api/File/requestUploadUrl";
/// Session-authenticated listing of the caller's files.
pub const API_GET_MY_FILES: &str = "/api/File/_getFilesByOwner";

const UPLOAD_FIELDS: &[(&str, &str)] = &[
    ("uploadUrl", "uploadUrl"),
    ("bucket", "bucket"),
    ("object", "object"),
];

/// File rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        forward(
            "RequestUploadUrlPlain",
            REQUEST_UPLOAD_URL,
            File::REQUEST_UPLOAD_URL,
            &["user", "filename"],
        ),
        respond_error(
            "RequestUploadUrlPlainError",
            REQUEST_UPLOAD_URL,
            File::REQUEST_UPLOAD_URL,
        ),
        respond_with(
            "RequestUploadUrlPlainResponse",
            REQUEST_UPLOAD_URL,
            File::REQUEST_UPLOAD_URL,
            UPLOAD_FIELDS,
        ),
        forward(
            "ConfirmUploadPlainRequest",
            CONFIRM_UPLOAD,
            File::CONFIRM_UPLOAD,
            &["user", "object"],
        ),
        respond_error("ConfirmUploadPlainError", CONFIRM_UPLOAD, File::CONFIRM_UPLOAD),
        respond_with(
            "ConfirmUploadPlainResponse",
            CONFIRM_UPLOAD,
            File::CONFIRM_UPLOAD,
            &[("file", "file"), ("url", "url")],
        ),
        forward(
            "GetViewUrlPlainRequest",
            GET_VIEW_URL,
            File::GET_VIEW_URL,
            &["user", "object"],
        ),
        respond_error("GetViewUrlPlainError", GET_VIEW_URL, File::GET_VIEW_URL),
        respond_with(
            "GetViewUrlPlainResponse",
            GET_VIEW_URL,
            File::GET_VIEW_URL,
            &[("url", "url")],
        ),
        upload_url_by_session(),
        respond_error(
            "RequestUploadUrlError",
            API_REQUEST_UPLOAD_URL,
            File::REQUEST_UPLOAD_URL,
        ),
        respond_with(
            "RequestUploadUrlResponse",
            API_REQUEST_UPLOAD_URL,
            File::REQUEST_UPLOAD_URL,
            UPLOAD_FIELDS,
        ),
        my_files(),
    ]
}

fn upload_url_by_session() -> SyncRule {
    SyncRule::define("RequestUploadUrl", |v| {
        let [request, session, filename, user] =
            v.vars(["request", "session", "filename", "user"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_REQUEST_UPLOAD_URL)
                    .with("session", session)
                    .with("filename", filename),
                fields! { "request" => request },
            )
            .refine(Where::new().query(
                SessionLogging::GET_USER,
                fields! { "session" => session },
                fields! { "user" => user },
            ))
            .then(
                File::REQUEST_UPLOAD_URL,
                fields! { "user" => user, "filename" => filename },
            )
    })
}

/// Lists the caller's files; answers `[]` when there are none.
fn my_files() -> SyncRule {
    SyncRule::define("GetMyFiles", |v| {
        let [request, session, user, files] = v.vars(["request", "session", "user", "files"]);
        let [file, bucket, object, created_at] =
            v.vars(["file", "bucket", "object", "createdAt"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_GET_MY_FILES).with("session", session),
                fields! { "request" => request },
            )
            .refine(
                Where::new()
                    .query(
                        SessionLogging::GET_USER,
                        fields! { "session" => session },
                        fields! { "user" => user },
                    )
                    .query(
                        File::GET_FILES_BY_OWNER,
                        fields! { "user" => user },
                        fields! {
                            "file" => file,
                            "bucket" => bucket,
                            "object" => object,
                            "createdAt" => created_at,
                        },
                    )
                    .collect_as(
                        [
                            ("file", file),
                            ("bucket", bucket),
                            ("object", object),
                            ("createdAt", created_at),
                        ],
                        files,
                    ),
            )
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "files" => files },
            )
    })
}
