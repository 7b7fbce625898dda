//! SessionLogging lifecycle.

use hatch_concepts::SessionLogging as Sessions;
use hatch_foundation::{Record, record};

use crate::support::{created, perform, query, registry, strings};

#[tokio::test]
async fn entries_are_recorded_while_active() {
    let registry = registry();
    let session = created(
        &registry,
        Sessions::START_SESSION,
        record! { "user" => "ada", "location" => "lab" },
        "newSession",
    )
    .await;

    for image in ["i1", "i2"] {
        let out = perform(
            &registry,
            Sessions::ADD_ENTRY,
            record! { "user" => "ada", "session" => session.as_str(), "image" => image },
        )
        .await;
        assert_eq!(out, record! { "newEntry" => image });
    }

    let entries = query(
        &registry,
        Sessions::GET_ENTRIES_IN_SESSION,
        record! { "session" => session.as_str() },
    )
    .await;
    assert_eq!(strings(&entries, "image"), vec!["i1", "i2"]);

    let details = query(
        &registry,
        Sessions::GET_SESSION_DETAILS,
        record! { "session" => session.as_str() },
    )
    .await;
    let details = details[0].get_record("sessionDetails").unwrap();
    assert_eq!(details.get_str("owner"), Some("ada"));
    assert_eq!(details.get_str("location"), Some("lab"));
    assert_eq!(details.get_bool("active"), Some(true));
}

#[tokio::test]
async fn ended_sessions_refuse_entries() {
    let registry = registry();
    let session = created(
        &registry,
        Sessions::START_SESSION,
        record! { "user" => "ada" },
        "newSession",
    )
    .await;
    let end = record! { "user" => "ada", "session" => session.as_str() };
    assert_eq!(perform(&registry, Sessions::END_SESSION, end.clone()).await, Record::new());

    let active = query(
        &registry,
        Sessions::IS_SESSION_ACTIVE,
        record! { "session" => session.as_str() },
    )
    .await;
    assert_eq!(active, vec![record! { "isActive" => false }]);

    let late = perform(
        &registry,
        Sessions::ADD_ENTRY,
        record! { "user" => "ada", "session" => session.as_str(), "image" => "i1" },
    )
    .await;
    assert!(late.error_message().unwrap().contains("is not active"));

    let twice = perform(&registry, Sessions::END_SESSION, end).await;
    assert!(twice.error_message().unwrap().contains("already inactive"));
}

#[tokio::test]
async fn only_the_owner_touches_a_session() {
    let registry = registry();
    let session = created(
        &registry,
        Sessions::START_SESSION,
        record! { "user" => "ada" },
        "newSession",
    )
    .await;
    let out = perform(
        &registry,
        Sessions::ADD_ENTRY,
        record! { "user" => "bob", "session" => session.as_str(), "image" => "i1" },
    )
    .await;
    assert!(out.error_message().unwrap().contains("is not the owner"));
}

#[tokio::test]
async fn sessions_list_in_creation_order() {
    let registry = registry();
    let mut started = Vec::new();
    for _ in 0..3 {
        started.push(
            created(
                &registry,
                Sessions::START_SESSION,
                record! { "user" => "ada" },
                "newSession",
            )
            .await,
        );
    }
    let owner = query(
        &registry,
        Sessions::GET_USER,
        record! { "session" => started[0].as_str() },
    )
    .await;
    assert_eq!(owner, vec![record! { "user" => "ada" }]);

    let rows = query(&registry, Sessions::GET_SESSIONS_BY_USER, record! { "user" => "ada" }).await;
    assert_eq!(strings(&rows, "session"), started);

    let unknown = query(&registry, Sessions::GET_USER, record! { "session" => "nope" }).await;
    assert!(unknown.is_empty());
}
