//! Registry and helpers shared by the concept tests.

use std::sync::Arc;
use std::time::Duration;

use hatch_concepts::{
    Commenting, File, FileConfig, Friending, PasswordAuthentication, Posting, Requesting,
    RequestingConfig, SessionLogging, UnsignedUrlSigner,
};
use hatch_engine::{ConceptRegistry, QuerySource};
use hatch_foundation::{ActionRef, IdMinter, List, QueryRef, Record, Value};

pub const BUCKET: &str = "test-bucket";
pub const BASE_URL: &str = "https://files.test";

/// Every concept, seeded, with a short response timeout and a configured
/// bucket.
pub fn registry() -> ConceptRegistry {
    registry_with(FileConfig::default().with_bucket(BUCKET).with_public_base_url(BASE_URL))
}

pub fn registry_with(file: FileConfig) -> ConceptRegistry {
    let signer = Arc::new(UnsignedUrlSigner::new(file.public_base_url.clone()));
    ConceptRegistry::new()
        .with(Requesting::with_ids(
            RequestingConfig::default().with_response_timeout(Duration::from_millis(50)),
            IdMinter::seeded(1),
        ))
        .with(PasswordAuthentication::with_ids(IdMinter::seeded(2)))
        .with(Friending::with_ids(IdMinter::seeded(3)))
        .with(Posting::with_ids(IdMinter::seeded(4)))
        .with(Commenting::with_ids(IdMinter::seeded(5)))
        .with(SessionLogging::with_ids(IdMinter::seeded(6)))
        .with(File::with_ids(file, signer, IdMinter::seeded(7)))
}

pub async fn perform(registry: &ConceptRegistry, action: ActionRef, input: Record) -> Record {
    registry.perform(&action, input).await.unwrap()
}

pub async fn query(registry: &ConceptRegistry, query: QueryRef, input: Record) -> Vec<Record> {
    registry.query(&query, input).await.unwrap()
}

/// Performs an action that must succeed and returns one string output field.
pub async fn created(
    registry: &ConceptRegistry,
    action: ActionRef,
    input: Record,
    field: &str,
) -> String {
    let out = perform(registry, action, input).await;
    assert!(!out.is_error(), "unexpected error: {out}");
    out.get_str(field).unwrap().to_string()
}

pub fn images(names: &[&str]) -> List {
    names.iter().map(|n| Value::from(*n)).collect()
}

pub fn strings(rows: &[Record], field: &str) -> Vec<String> {
    rows.iter()
        .map(|r| r.get_str(field).unwrap().to_string())
        .collect()
}
