//! File: upload and view URLs behind the unsigned signer.

use hatch_concepts::{File, FileConfig};
use hatch_foundation::record;

use crate::support::{BASE_URL, BUCKET, perform, query, registry, registry_with};

#[tokio::test]
async fn upload_url_targets_a_sanitized_object() {
    let registry = registry();
    let out = perform(
        &registry,
        File::REQUEST_UPLOAD_URL,
        record! { "user" => "ada", "filename" => "my photo!.png", "expiresInSeconds" => 60 },
    )
    .await;
    assert_eq!(out.get_str("bucket"), Some(BUCKET));
    let object = out.get_str("object").unwrap();
    assert!(object.starts_with("ada/"));
    assert!(object.ends_with("-my-photo-.png"));
    let url = out.get_str("uploadUrl").unwrap();
    assert!(url.starts_with(&format!("{BASE_URL}/{BUCKET}/ada/")));
    assert!(url.ends_with("method=PUT&expires=60"));
}

#[tokio::test]
async fn confirmed_uploads_are_listed_by_owner() {
    let registry = registry();
    let out = perform(
        &registry,
        File::CONFIRM_UPLOAD,
        record! { "user" => "ada", "object" => "ada/1-a.png", "size" => 10 },
    )
    .await;
    let file = out.get_str("file").unwrap().to_string();
    assert_eq!(
        out.get_str("url"),
        Some(format!("{BASE_URL}/{BUCKET}/ada/1-a.png").as_str())
    );

    let rows = query(&registry, File::GET_FILES_BY_OWNER, record! { "user" => "ada" }).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("file"), Some(file.as_str()));
    assert_eq!(rows[0].get_int("size"), Some(10));

    let none = query(&registry, File::GET_FILES_BY_OWNER, record! { "user" => "bob" }).await;
    assert!(none.is_empty());
}

#[tokio::test]
async fn view_url_uses_default_expiry() {
    let registry = registry();
    let out = perform(
        &registry,
        File::GET_VIEW_URL,
        record! { "user" => "ada", "object" => "ada/1-a.png" },
    )
    .await;
    assert!(out.get_str("url").unwrap().ends_with("method=GET&expires=300"));
}

#[tokio::test]
async fn missing_bucket_is_a_business_error() {
    let registry = registry_with(FileConfig::default());
    let out = perform(
        &registry,
        File::REQUEST_UPLOAD_URL,
        record! { "user" => "ada", "filename" => "a.png" },
    )
    .await;
    assert_eq!(out.error_message(), Some("GCS_BUCKET env var is required"));
}
