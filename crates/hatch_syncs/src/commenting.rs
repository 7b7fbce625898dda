//! Comments.
//!
//! Commenting through a session is allowed on one's own posts and on posts
//! by friends.

use hatch_concepts::{Commenting, Friending, PasswordAuthentication, Posting, Requesting, SessionLogging};
use hatch_engine::{SyncBody, SyncRule, Where, fields};
use hatch_foundation::Value;

use crate::common::{forward, request_on, respond_error, respond_status, respond_with};

/// Plain add path.
pub const ADD_COMMENT: &str = "/Commenting/addComment";
/// Plain edit path.
pub const EDIT_COMMENT: &str = "/Commenting/editComment";
/// Plain delete path.
pub const DELETE_COMMENT: &str = "/Commenting/deleteComment";
/// Session-authenticated add path.
pub const API_ADD_COMMENT: &str = "/api/Commenting/addComment";

/// Commenting rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        forward(
            "AddCommentPlainRequest",
            ADD_COMMENT,
            Commenting::ADD_COMMENT,
            &["author", "content", "post"],
        ),
        respond_error("AddCommentPlainError", ADD_COMMENT, Commenting::ADD_COMMENT),
        respond_with(
            "AddCommentPlainResponse",
            ADD_COMMENT,
            Commenting::ADD_COMMENT,
            &[("comment", "comment")],
        ),
        forward(
            "EditCommentPlainRequest",
            EDIT_COMMENT,
            Commenting::EDIT_COMMENT,
            &["user", "comment", "new_content"],
        ),
        respond_error("EditCommentPlainError", EDIT_COMMENT, Commenting::EDIT_COMMENT),
        respond_status(
            "EditCommentPlainResponse",
            EDIT_COMMENT,
            Commenting::EDIT_COMMENT,
            "success",
        ),
        forward(
            "DeleteCommentPlainRequest",
            DELETE_COMMENT,
            Commenting::DELETE_COMMENT,
            &["user", "comment"],
        ),
        respond_error(
            "DeleteCommentPlainError",
            DELETE_COMMENT,
            Commenting::DELETE_COMMENT,
        ),
        respond_status(
            "DeleteCommentPlainResponse",
            DELETE_COMMENT,
            Commenting::DELETE_COMMENT,
            "success",
        ),
        add_comment_by_session(),
        respond_error("AddCommentError", API_ADD_COMMENT, Commenting::ADD_COMMENT),
        respond_with(
            "AddCommentResponse",
            API_ADD_COMMENT,
            Commenting::ADD_COMMENT,
            &[("comment", "comment")],
        ),
    ]
}

/// Adds a comment when the session's owner wrote the post or is friends
/// with its author. Friendships are keyed by username, so both ids are
/// resolved first.
fn add_comment_by_session() -> SyncRule {
    SyncRule::define("AddCommentRequest", |v| {
        let [request, session, content, post] = v.vars(["request", "session", "content", "post"]);
        let [user, details, author] = v.vars(["user", "postDetails", "author"]);
        let [user_name, author_name, are_friends] =
            v.vars(["userName", "authorName", "areFriends"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_ADD_COMMENT)
                    .with("session", session)
                    .with("content", content)
                    .with("post", post),
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
                        Posting::GET_POST_BY_ID,
                        fields! { "post" => post },
                        fields! { "postDetails" => details },
                    )
                    .derive(author, move |f| {
                        f.get(details)?.as_record()?.get("author").cloned()
                    })
                    .query(
                        PasswordAuthentication::GET_USER_BY_ID,
                        fields! { "user" => user },
                        fields! { "username" => user_name },
                    )
                    .query(
                        PasswordAuthentication::GET_USER_BY_ID,
                        fields! { "user" => author },
                        fields! { "username" => author_name },
                    )
                    .query(
                        Friending::IS_FRIENDS,
                        fields! { "user1" => user_name, "user2" => author_name },
                        fields! { "areFriends" => are_friends },
                    )
                    .filter(move |f| {
                        f.get(user) == f.get(author)
                            || f.get(are_friends) == Some(&Value::Bool(true))
                    }),
            )
            .then(
                Commenting::ADD_COMMENT,
                fields! { "author" => user, "content" => content, "post" => post },
            )
    })
}
