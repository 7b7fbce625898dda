//! Read endpoints.
//!
//! Listings answer with every matching row folded into one list, and with
//! an empty list when nothing matches, so a listing request never waits
//! out the response timeout.

use hatch_concepts::{
    Commenting, Friending, PasswordAuthentication, Posting, Requesting, SessionLogging,
};
use hatch_engine::{Fields, SyncBody, SyncRule, Where, fields};
use hatch_foundation::QueryRef;

use crate::common::request_on;
use crate::sessions::owned_by_caller;

/// Friends of `user`.
pub const GET_FRIENDS: &str = "/Friending/_getFriends";
/// Requests sent by `sender`.
pub const GET_SENT_REQUESTS: &str = "/Friending/_getSentFriendRequests";
/// Requests received by `receiver`.
pub const GET_RECEIVED_REQUESTS: &str = "/Friending/_getReceivedFriendRequests";
/// Every registered user.
pub const GET_ALL_USERS: &str = "/PasswordAuthentication/_getAllUsers";
/// One user by `username`.
pub const GET_USER_BY_USERNAME: &str = "/PasswordAuthentication/_getUserByUsername";
/// Posts by `user`, newest first.
pub const GET_POSTS_BY_AUTHOR: &str = "/Posting/_getPostsByAuthor";
/// Comments on `post`, oldest first.
pub const GET_COMMENTS_FOR_POST: &str = "/Commenting/_getCommentsForPost";
/// Comments by `author`, oldest first.
pub const GET_COMMENTS_BY_AUTHOR: &str = "/Commenting/_getCommentsByAuthor";
/// The caller's logging sessions.
pub const API_GET_SESSIONS_BY_USER: &str = "/api/SessionLogging/_getSessionsByUser";
/// Details of a session the caller owns.
pub const API_GET_SESSION_DETAILS: &str = "/api/SessionLogging/_getSessionDetails";
/// Entries of a session the caller owns.
pub const API_GET_ENTRIES_IN_SESSION: &str = "/api/SessionLogging/_getEntriesInSession";
/// Whether a session the caller owns is still active.
pub const API_IS_SESSION_ACTIVE: &str = "/api/SessionLogging/_isSessionActive";

const POST_COLUMNS: &[&str] = &["post", "author", "caption", "images", "createdAt"];
const COMMENT_COLUMNS: &[&str] = &["comment", "author", "content", "post", "createdAt"];

/// Read endpoint rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        listing(
            "GetFriendsPlain",
            GET_FRIENDS,
            &[("user", "user")],
            Friending::GET_FRIENDS,
            &["friend"],
            "friends",
        ),
        listing(
            "GetSentFriendRequestsPlain",
            GET_SENT_REQUESTS,
            &[("sender", "sender")],
            Friending::GET_SENT_REQUESTS,
            &["receiver"],
            "sentRequests",
        ),
        listing(
            "GetReceivedFriendRequestsPlain",
            GET_RECEIVED_REQUESTS,
            &[("receiver", "receiver")],
            Friending::GET_RECEIVED_REQUESTS,
            &["sender"],
            "receivedRequests",
        ),
        listing(
            "GetAllUsersPlain",
            GET_ALL_USERS,
            &[],
            PasswordAuthentication::GET_ALL_USERS,
            &["user", "username"],
            "users",
        ),
        user_by_username(),
        user_by_username_missing(),
        listing(
            "GetPostsByAuthorPlain",
            GET_POSTS_BY_AUTHOR,
            &[("user", "user")],
            Posting::GET_POSTS_BY_AUTHOR,
            POST_COLUMNS,
            "posts",
        ),
        listing(
            "GetCommentsForPostPlain",
            GET_COMMENTS_FOR_POST,
            &[("post", "post")],
            Commenting::GET_COMMENTS_FOR_POST,
            COMMENT_COLUMNS,
            "comments",
        ),
        listing(
            "GetCommentsByAuthorPlain",
            GET_COMMENTS_BY_AUTHOR,
            &[("author", "author")],
            Commenting::GET_COMMENTS_BY_AUTHOR,
            COMMENT_COLUMNS,
            "comments",
        ),
        sessions_by_user(),
        session_details(),
        entries_in_session(),
        is_session_active(),
    ]
}

/// Answers `path` with the rows of `query` folded into `into`.
///
/// `params` pairs a request field with the query input field it feeds.
/// Row variables are namespaced under `into` so they never unify with a
/// request field of the same name.
fn listing(
    name: &str,
    path: &'static str,
    params: &[(&'static str, &'static str)],
    query: QueryRef,
    columns: &[&'static str],
    into: &'static str,
) -> SyncRule {
    SyncRule::define(name, |v| {
        let [request, list] = v.vars(["request", into]);
        let mut input = request_on(path);
        let mut query_input = Fields::new();
        for (field, query_field) in params {
            let var = v.var(field);
            input = input.with(*field, var);
            query_input = query_input.with(*query_field, var);
        }
        let mut output = Fields::new();
        let mut collected = Vec::with_capacity(columns.len());
        for column in columns {
            let var = v.var(&format!("{into}.{column}"));
            output = output.with(*column, var);
            collected.push((*column, var));
        }
        SyncBody::new()
            .when_done(Requesting::REQUEST, input, fields! { "request" => request })
            .refine(
                Where::new()
                    .query(query, query_input, output)
                    .collect_as(collected, list),
            )
            .then(Requesting::RESPOND, fields! { "request" => request, into => list })
    })
}

fn user_by_username() -> SyncRule {
    SyncRule::define("GetUserByUsernamePlain", |v| {
        let [request, username, user] = v.vars(["request", "username", "user"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(GET_USER_BY_USERNAME).with("username", username),
                fields! { "request" => request },
            )
            .refine(Where::new().query(
                PasswordAuthentication::GET_USER_BY_USERNAME,
                fields! { "username" => username },
                fields! { "user" => user },
            ))
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "user" => user, "username" => username },
            )
    })
}

fn user_by_username_missing() -> SyncRule {
    SyncRule::define("GetUserByUsernamePlainMissing", |v| {
        let [request, username] = v.vars(["request", "username"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(GET_USER_BY_USERNAME).with("username", username),
                fields! { "request" => request },
            )
            .refine(Where::new().query(
                PasswordAuthentication::USER_EXISTS_BY_USERNAME,
                fields! { "username" => username },
                fields! { "exists" => false },
            ))
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "error" => "User not found." },
            )
    })
}

fn sessions_by_user() -> SyncRule {
    SyncRule::define("GetSessionsByUser", |v| {
        let [request, session, user, listed, sessions] =
            v.vars(["request", "session", "user", "sessions.session", "sessions"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_GET_SESSIONS_BY_USER).with("session", session),
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
                        SessionLogging::GET_SESSIONS_BY_USER,
                        fields! { "user" => user },
                        fields! { "session" => listed },
                    )
                    .collect_as([("session", listed)], sessions),
            )
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "sessions" => sessions },
            )
    })
}

fn session_details() -> SyncRule {
    SyncRule::define("GetSessionDetails", |v| {
        let [request, session, session_id, user, details] =
            v.vars(["request", "session", "sessionId", "user", "sessionDetails"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_GET_SESSION_DETAILS)
                    .with("session", session)
                    .with("sessionId", session_id),
                fields! { "request" => request },
            )
            .refine(owned_by_caller(session, session_id, user, details))
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "sessionDetails" => details },
            )
    })
}

/// Entries of an owned session; a session the caller does not own lists
/// as empty.
fn entries_in_session() -> SyncRule {
    SyncRule::define("GetEntriesInSession", |v| {
        let [request, session, session_id, user, details] =
            v.vars(["request", "session", "sessionId", "user", "sessionDetails"]);
        let [image, entries] = v.vars(["entries.image", "entries"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_GET_ENTRIES_IN_SESSION)
                    .with("session", session)
                    .with("sessionId", session_id),
                fields! { "request" => request },
            )
            .refine(
                owned_by_caller(session, session_id, user, details)
                    .query(
                        SessionLogging::GET_ENTRIES_IN_SESSION,
                        fields! { "session" => session_id },
                        fields! { "image" => image },
                    )
                    .collect_as([("image", image)], entries),
            )
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "entries" => entries },
            )
    })
}

fn is_session_active() -> SyncRule {
    SyncRule::define("IsSessionActive", |v| {
        let [request, session, session_id, user, details, active] = v.vars([
            "request",
            "session",
            "sessionId",
            "user",
            "sessionDetails",
            "isActive",
        ]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_IS_SESSION_ACTIVE)
                    .with("session", session)
                    .with("sessionId", session_id),
                fields! { "request" => request },
            )
            .refine(
                owned_by_caller(session, session_id, user, details).query(
                    SessionLogging::IS_SESSION_ACTIVE,
                    fields! { "session" => session_id },
                    fields! { "isActive" => active },
                ),
            )
            .then(
                Requesting::RESPOND,
                fields! { "request" => request, "isActive" => active },
            )
    })
}
