//! Friend requests over plain and session paths.

use hatch_foundation::record;
use hatch_syncs::{friending, reads};

use crate::support::{app, column, ok, rejected, sign_up, unanswered};

#[tokio::test]
async fn plain_request_accept_and_remove() {
    let app = app();
    let pair = record! { "sender" => "ada", "receiver" => "bob" };

    let sent = ok(&app, friending::SEND_REQUEST, pair.clone()).await;
    assert!(sent.get_str("friendRequest").is_some());

    let received = ok(&app, reads::GET_RECEIVED_REQUESTS, record! { "receiver" => "bob" }).await;
    assert_eq!(column(&received, "receivedRequests", "sender"), vec!["ada"]);

    let accepted = ok(&app, friending::ACCEPT_REQUEST, pair).await;
    assert_eq!(accepted, record! { "status" => "success" });

    let friends = ok(&app, reads::GET_FRIENDS, record! { "user" => "bob" }).await;
    assert_eq!(column(&friends, "friends", "friend"), vec!["ada"]);

    let removed = ok(
        &app,
        friending::REMOVE_FRIEND,
        record! { "user" => "ada", "to_be_removed_friend" => "bob" },
    )
    .await;
    assert_eq!(removed, record! { "status" => "success" });

    let friends = ok(&app, reads::GET_FRIENDS, record! { "user" => "bob" }).await;
    assert!(column(&friends, "friends", "friend").is_empty());
}

#[tokio::test]
async fn plain_errors_are_forwarded() {
    let app = app();
    let error = rejected(
        &app,
        friending::DENY_REQUEST,
        record! { "sender" => "ada", "receiver" => "bob" },
    )
    .await;
    assert_eq!(error, "Friend request does not exist.");
}

#[tokio::test]
async fn session_request_is_sent_between_usernames() {
    let app = app();
    let (_, ada_session) = sign_up(&app, "ada").await;
    sign_up(&app, "bob").await;

    let sent = ok(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => ada_session.as_str(), "toUsername" => "bob" },
    )
    .await;
    assert!(sent.get_str("friendRequest").is_some());

    let pending = ok(&app, reads::GET_SENT_REQUESTS, record! { "sender" => "ada" }).await;
    assert_eq!(column(&pending, "sentRequests", "receiver"), vec!["bob"]);

    let again = rejected(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => ada_session.as_str(), "toUsername" => "bob" },
    )
    .await;
    assert_eq!(again, "A friend request between these users already exists.");
}

#[tokio::test]
async fn session_request_needs_a_real_other_stranger() {
    let app = app();
    let (_, ada_session) = sign_up(&app, "ada").await;
    sign_up(&app, "bob").await;

    unanswered(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => ada_session.as_str(), "toUsername" => "ada" },
    )
    .await;
    unanswered(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => ada_session.as_str(), "toUsername" => "nobody" },
    )
    .await;
    unanswered(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => "not-a-session", "toUsername" => "bob" },
    )
    .await;

    let pair = record! { "sender" => "ada", "receiver" => "bob" };
    ok(&app, friending::SEND_REQUEST, pair.clone()).await;
    ok(&app, friending::ACCEPT_REQUEST, pair).await;
    unanswered(
        &app,
        friending::API_SEND_REQUEST,
        record! { "session" => ada_session.as_str(), "toUsername" => "bob" },
    )
    .await;
}
