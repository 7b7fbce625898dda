//! Comments through sessions: own posts and friends' posts only.

use hatch_foundation::record;
use hatch_syncs::{App, commenting, friending, posting, reads};

use crate::support::{app, column, ok, rejected, sign_up, string, unanswered};

async fn post_by(app: &App, user: &str) -> String {
    let response = ok(
        app,
        posting::CREATE,
        record! { "user" => user, "images" => vec!["i1"], "caption" => "c" },
    )
    .await;
    string(&response, "post")
}

async fn befriend(app: &App, a: &str, b: &str) {
    let pair = record! { "sender" => a, "receiver" => b };
    ok(app, friending::SEND_REQUEST, pair.clone()).await;
    ok(app, friending::ACCEPT_REQUEST, pair).await;
}

#[tokio::test]
async fn author_comments_on_own_post() {
    let app = app();
    let (ada, session) = sign_up(&app, "ada").await;
    let post = post_by(&app, &ada).await;

    let added = ok(
        &app,
        commenting::API_ADD_COMMENT,
        record! { "session" => session.as_str(), "post" => post.as_str(), "content" => "mine" },
    )
    .await;
    assert!(added.get_str("comment").is_some());

    let by_ada = ok(
        &app,
        reads::GET_COMMENTS_BY_AUTHOR,
        record! { "author" => ada.as_str() },
    )
    .await;
    assert_eq!(column(&by_ada, "comments", "content"), vec!["mine"]);
}

#[tokio::test]
async fn friend_comments_and_stranger_does_not() {
    let app = app();
    let (ada, _) = sign_up(&app, "ada").await;
    let (_, bob_session) = sign_up(&app, "bob").await;
    let (_, cy_session) = sign_up(&app, "cy").await;
    befriend(&app, "ada", "bob").await;
    let post = post_by(&app, &ada).await;

    ok(
        &app,
        commenting::API_ADD_COMMENT,
        record! { "session" => bob_session.as_str(), "post" => post.as_str(), "content" => "nice" },
    )
    .await;
    unanswered(
        &app,
        commenting::API_ADD_COMMENT,
        record! { "session" => cy_session.as_str(), "post" => post.as_str(), "content" => "hi" },
    )
    .await;

    let listed = ok(&app, reads::GET_COMMENTS_FOR_POST, record! { "post" => post.as_str() }).await;
    assert_eq!(column(&listed, "comments", "content"), vec!["nice"]);
}

#[tokio::test]
async fn comment_on_missing_post_is_unanswered() {
    let app = app();
    let (_, session) = sign_up(&app, "ada").await;
    unanswered(
        &app,
        commenting::API_ADD_COMMENT,
        record! { "session" => session.as_str(), "post" => "gone", "content" => "x" },
    )
    .await;
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let app = app();
    let (ada, session) = sign_up(&app, "ada").await;
    let post = post_by(&app, &ada).await;
    let error = rejected(
        &app,
        commenting::API_ADD_COMMENT,
        record! { "session" => session.as_str(), "post" => post.as_str(), "content" => "" },
    )
    .await;
    assert_eq!(error, "Comment content cannot be empty.");
}

#[tokio::test]
async fn plain_edit_and_delete() {
    let app = app();
    let added = ok(
        &app,
        commenting::ADD_COMMENT,
        record! { "author" => "ada", "post" => "p1", "content" => "draft" },
    )
    .await;
    let comment = string(&added, "comment");

    let edited = ok(
        &app,
        commenting::EDIT_COMMENT,
        record! { "user" => "ada", "comment" => comment.as_str(), "new_content" => "final" },
    )
    .await;
    assert_eq!(edited, record! { "status" => "success" });

    let denied = rejected(
        &app,
        commenting::DELETE_COMMENT,
        record! { "user" => "bob", "comment" => comment.as_str() },
    )
    .await;
    assert_eq!(denied, "Unauthorized: User is not the author of this comment.");

    ok(
        &app,
        commenting::DELETE_COMMENT,
        record! { "user" => "ada", "comment" => comment.as_str() },
    )
    .await;
    let listed = ok(&app, reads::GET_COMMENTS_FOR_POST, record! { "post" => "p1" }).await;
    assert!(column(&listed, "comments", "content").is_empty());
}
