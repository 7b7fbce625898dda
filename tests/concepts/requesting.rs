//! Requesting: correlation, first-response-wins and timeouts.

use hatch_concepts::Requesting;
use hatch_foundation::{ErrorKind, Record, record};

use crate::support::{created, perform, query, registry};

#[tokio::test]
async fn first_response_wins() {
    let registry = registry();
    let request = created(
        &registry,
        Requesting::REQUEST,
        record! { "path" => "/Posting/create" },
        "request",
    )
    .await;

    let first = perform(
        &registry,
        Requesting::RESPOND,
        record! { "request" => request.as_str(), "post" => "p1" },
    )
    .await;
    assert_eq!(first, record! { "request" => request.as_str() });

    let second = perform(
        &registry,
        Requesting::RESPOND,
        record! { "request" => request.as_str(), "error" => "late" },
    )
    .await;
    assert_eq!(
        second.error_message(),
        Some(format!("Request {request} already has a response.").as_str())
    );

    let rows = query(
        &registry,
        Requesting::AWAIT_RESPONSE,
        record! { "request" => request.as_str() },
    )
    .await;
    assert_eq!(rows[0].get_record("response"), Some(&record! { "post" => "p1" }));
}

#[tokio::test]
async fn responding_to_an_unknown_request_is_a_business_error() {
    let registry = registry();
    let out = perform(&registry, Requesting::RESPOND, record! { "request" => "nope" }).await;
    assert_eq!(out.error_message(), Some("Request nope not found."));

    let out = perform(&registry, Requesting::RESPOND, Record::new()).await;
    assert_eq!(out.error_message(), Some("Request ID must be provided."));
}

#[tokio::test]
async fn waiting_without_a_response_times_out() {
    let registry = registry();
    let request = created(&registry, Requesting::REQUEST, Record::new(), "request").await;
    let err = hatch_engine::QuerySource::query(
        &registry,
        &Requesting::AWAIT_RESPONSE,
        record! { "request" => request.as_str() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Timeout(_)));
}

#[tokio::test]
async fn waiter_wakes_when_a_response_arrives() {
    let registry = std::sync::Arc::new(registry());
    let request = created(&registry, Requesting::REQUEST, Record::new(), "request").await;

    let waiter = {
        let registry = registry.clone();
        let request = request.clone();
        tokio::spawn(async move {
            query(
                &registry,
                Requesting::AWAIT_RESPONSE,
                record! { "request" => request.as_str() },
            )
            .await
        })
    };
    tokio::task::yield_now().await;
    perform(
        &registry,
        Requesting::RESPOND,
        record! { "request" => request.as_str(), "status" => "ok" },
    )
    .await;

    let rows = waiter.await.unwrap();
    assert_eq!(rows[0].get_record("response"), Some(&record! { "status" => "ok" }));
}
