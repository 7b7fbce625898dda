//! Friend requests and friendships.
//!
//! Friendships are keyed by username. The plain paths take usernames as
//! given; `/api/Friending/sendRequest` resolves the sender from a logging
//! session and checks the recipient before sending.

use hatch_concepts::{Friending, PasswordAuthentication, Requesting, SessionLogging};
use hatch_engine::{SyncBody, SyncRule, Where, fields};
use hatch_foundation::Value;

use crate::common::{forward, request_on, respond_error, respond_status, respond_with};

/// Plain send path.
pub const SEND_REQUEST: &str = "/Friending/sendRequest";
/// Plain accept path.
pub const ACCEPT_REQUEST: &str = "/Friending/acceptRequest";
/// Plain deny path.
pub const DENY_REQUEST: &str = "/Friending/denyRequest";
/// Plain remove path.
pub const REMOVE_FRIEND: &str = "/Friending/removeFriend";
/// Session-authenticated send path.
pub const API_SEND_REQUEST: &str = "/api/Friending/sendRequest";

/// Friending rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        forward(
            "SendFriendRequestPlainRequest",
            SEND_REQUEST,
            Friending::SEND_REQUEST,
            &["sender", "receiver"],
        ),
        respond_error("SendFriendRequestPlainError", SEND_REQUEST, Friending::SEND_REQUEST),
        respond_with(
            "SendFriendRequestPlainResponse",
            SEND_REQUEST,
            Friending::SEND_REQUEST,
            &[("request", "friendRequest")],
        ),
        forward(
            "AcceptFriendRequestPlainRequest",
            ACCEPT_REQUEST,
            Friending::ACCEPT_REQUEST,
            &["sender", "receiver"],
        ),
        respond_error(
            "AcceptFriendRequestPlainError",
            ACCEPT_REQUEST,
            Friending::ACCEPT_REQUEST,
        ),
        respond_status(
            "AcceptFriendRequestPlainResponse",
            ACCEPT_REQUEST,
            Friending::ACCEPT_REQUEST,
            "success",
        ),
        forward(
            "DenyFriendRequestPlainRequest",
            DENY_REQUEST,
            Friending::DENY_REQUEST,
            &["sender", "receiver"],
        ),
        respond_error("DenyFriendRequestPlainError", DENY_REQUEST, Friending::DENY_REQUEST),
        respond_status(
            "DenyFriendRequestPlainResponse",
            DENY_REQUEST,
            Friending::DENY_REQUEST,
            "success",
        ),
        forward(
            "RemoveFriendPlainRequest",
            REMOVE_FRIEND,
            Friending::REMOVE_FRIEND,
            &["user", "to_be_removed_friend"],
        ),
        respond_error("RemoveFriendPlainError", REMOVE_FRIEND, Friending::REMOVE_FRIEND),
        respond_status(
            "RemoveFriendPlainResponse",
            REMOVE_FRIEND,
            Friending::REMOVE_FRIEND,
            "success",
        ),
        send_request_by_session(),
        respond_error("SendFriendRequestError", API_SEND_REQUEST, Friending::SEND_REQUEST),
        respond_with(
            "SendFriendRequestResponse",
            API_SEND_REQUEST,
            Friending::SEND_REQUEST,
            &[("request", "friendRequest")],
        ),
    ]
}

/// Sends a request from the session's owner to `toUsername`, provided the
/// recipient exists, is someone else, and is not already a friend.
fn send_request_by_session() -> SyncRule {
    SyncRule::define("SendFriendRequest", |v| {
        let [request, session, to_username] = v.vars(["request", "session", "toUsername"]);
        let [user, from_username, to_user, are_friends] =
            v.vars(["user", "fromUsername", "toUser", "areFriends"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_SEND_REQUEST)
                    .with("session", session)
                    .with("toUsername", to_username),
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
                        PasswordAuthentication::GET_USER_BY_ID,
                        fields! { "user" => user },
                        fields! { "username" => from_username },
                    )
                    .query(
                        PasswordAuthentication::GET_USER_BY_USERNAME,
                        fields! { "username" => to_username },
                        fields! { "user" => to_user },
                    )
                    .filter(move |f| f.get(user) != f.get(to_user))
                    .query(
                        Friending::IS_FRIENDS,
                        fields! { "user1" => from_username, "user2" => to_username },
                        fields! { "areFriends" => are_friends },
                    )
                    .filter(move |f| f.get(are_friends) == Some(&Value::Bool(false))),
            )
            .then(
                Friending::SEND_REQUEST,
                fields! { "sender" => from_username, "receiver" => to_username },
            )
    })
}
