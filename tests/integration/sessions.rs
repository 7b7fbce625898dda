//! Logging sessions over `/api` paths, with owner checks.

use hatch_foundation::record;
use hatch_syncs::{reads, sessions};

use crate::support::{app, column, ok, rejected, sign_up, string, unanswered};

#[tokio::test]
async fn session_lifecycle() {
    let app = app();
    let (ada, login) = sign_up(&app, "ada").await;

    let started = ok(&app, sessions::API_START_SESSION, record! { "session" => login.as_str() }).await;
    let logging = string(&started, "newSession");

    for entry in ["img-1", "img-2"] {
        let added = ok(
            &app,
            sessions::API_ADD_ENTRY,
            record! { "session" => login.as_str(), "sessionId" => logging.as_str(), "entry" => entry },
        )
        .await;
        assert_eq!(added, record! { "newEntry" => entry });
    }

    let owned = record! { "session" => login.as_str(), "sessionId" => logging.as_str() };
    let entries = ok(&app, reads::API_GET_ENTRIES_IN_SESSION, owned.clone()).await;
    assert_eq!(column(&entries, "entries", "image"), vec!["img-1", "img-2"]);

    let details = ok(&app, reads::API_GET_SESSION_DETAILS, owned.clone()).await;
    let details = details.get_record("sessionDetails").unwrap();
    assert_eq!(details.get_str("owner"), Some(ada.as_str()));

    let ended = ok(&app, sessions::API_END_SESSION, owned.clone()).await;
    assert_eq!(ended, record! { "status" => "ended" });

    let active = ok(&app, reads::API_IS_SESSION_ACTIVE, owned).await;
    assert_eq!(active, record! { "isActive" => false });

    let listed = ok(
        &app,
        reads::API_GET_SESSIONS_BY_USER,
        record! { "session" => login.as_str() },
    )
    .await;
    assert_eq!(column(&listed, "sessions", "session"), vec![login, logging]);
}

#[tokio::test]
async fn ended_session_refuses_entries() {
    let app = app();
    let (_, login) = sign_up(&app, "ada").await;
    let started = ok(&app, sessions::API_START_SESSION, record! { "session" => login.as_str() }).await;
    let logging = string(&started, "newSession");
    let owned = record! { "session" => login.as_str(), "sessionId" => logging.as_str() };
    ok(&app, sessions::API_END_SESSION, owned.clone()).await;

    let error = rejected(&app, sessions::API_ADD_ENTRY, owned.clone().with("entry", "late")).await;
    assert!(error.contains("is not active"), "{error}");

    let error = rejected(&app, sessions::API_END_SESSION, owned).await;
    assert!(error.contains("already inactive"), "{error}");
}

#[tokio::test]
async fn other_users_sessions_are_off_limits() {
    let app = app();
    let (_, ada_login) = sign_up(&app, "ada").await;
    let (_, bob_login) = sign_up(&app, "bob").await;
    let started = ok(&app, sessions::API_START_SESSION, record! { "session" => ada_login.as_str() }).await;
    let logging = string(&started, "newSession");

    let intruder = record! { "session" => bob_login.as_str(), "sessionId" => logging.as_str() };
    unanswered(&app, sessions::API_ADD_ENTRY, intruder.clone().with("entry", "x")).await;
    unanswered(&app, sessions::API_END_SESSION, intruder.clone()).await;
    unanswered(&app, reads::API_GET_SESSION_DETAILS, intruder.clone()).await;

    let entries = ok(&app, reads::API_GET_ENTRIES_IN_SESSION, intruder).await;
    assert!(column(&entries, "entries", "image").is_empty());
}

#[tokio::test]
async fn plain_paths_take_user_ids() {
    let app = app();
    let started = ok(&app, sessions::START_SESSION, record! { "user" => "u1" }).await;
    let session = string(&started, "session");

    let added = ok(
        &app,
        sessions::ADD_ENTRY,
        record! { "user" => "u1", "session" => session.as_str(), "image" => "i" },
    )
    .await;
    assert_eq!(added, record! { "status" => "success" });

    let error = rejected(
        &app,
        sessions::END_SESSION,
        record! { "user" => "u2", "session" => session.as_str() },
    )
    .await;
    assert!(error.contains("is not the owner"), "{error}");
}
