//! Logging sessions.
//!
//! On `/api/...` paths `session` names the caller's own logging session and
//! stands in for authentication; `sessionId` names the session acted on,
//! which the caller must own.

use hatch_concepts::{Requesting, SessionLogging};
use hatch_engine::{SyncBody, SyncRule, Where, fields};
use hatch_foundation::Var;

use crate::common::{forward, request_on, respond_error, respond_status, respond_with};

/// Plain start path.
pub const START_SESSION: &str = "/SessionLogging/startSession";
/// Plain add-entry path.
pub const ADD_ENTRY: &str = "/SessionLogging/addEntry";
/// Plain end path.
pub const END_SESSION: &str = "/SessionLogging/endSession";
/// Session-authenticated start path.
pub const API_START_SESSION: &str = "/api/SessionLogging/startSession";
/// Session-authenticated add-entry path.
pub const API_ADD_ENTRY: &str = "/api/SessionLogging/addEntry";
/// Session-authenticated end path.
pub const API_END_SESSION: &str = "/api/SessionLogging/endSession";

/// Session logging rules.
#[must_use]
pub fn rules() -> Vec<SyncRule> {
    vec![
        forward(
            "StartSessionPlainRequest",
            START_SESSION,
            SessionLogging::START_SESSION,
            &["user"],
        ),
        respond_error(
            "StartSessionPlainError",
            START_SESSION,
            SessionLogging::START_SESSION,
        ),
        respond_with(
            "StartSessionPlainResponse",
            START_SESSION,
            SessionLogging::START_SESSION,
            &[("newSession", "session")],
        ),
        forward(
            "AddEntryPlainRequest",
            ADD_ENTRY,
            SessionLogging::ADD_ENTRY,
            &["user", "session", "image"],
        ),
        respond_error("AddEntryPlainError", ADD_ENTRY, SessionLogging::ADD_ENTRY),
        respond_status(
            "AddEntryPlainResponse",
            ADD_ENTRY,
            SessionLogging::ADD_ENTRY,
            "success",
        ),
        forward(
            "EndSessionPlainRequest",
            END_SESSION,
            SessionLogging::END_SESSION,
            &["user", "session"],
        ),
        respond_error("EndSessionPlainError", END_SESSION, SessionLogging::END_SESSION),
        respond_status(
            "EndSessionPlainResponse",
            END_SESSION,
            SessionLogging::END_SESSION,
            "success",
        ),
        start_by_session(),
        respond_error(
            "StartSessionError",
            API_START_SESSION,
            SessionLogging::START_SESSION,
        ),
        respond_with(
            "StartSessionResponse",
            API_START_SESSION,
            SessionLogging::START_SESSION,
            &[("newSession", "newSession")],
        ),
        add_entry_by_session(),
        respond_error("AddEntryError", API_ADD_ENTRY, SessionLogging::ADD_ENTRY),
        respond_with(
            "AddEntryResponse",
            API_ADD_ENTRY,
            SessionLogging::ADD_ENTRY,
            &[("newEntry", "newEntry")],
        ),
        end_by_session(),
        respond_error("EndSessionError", API_END_SESSION, SessionLogging::END_SESSION),
        respond_status(
            "EndSessionResponse",
            API_END_SESSION,
            SessionLogging::END_SESSION,
            "ended",
        ),
    ]
}

fn start_by_session() -> SyncRule {
    SyncRule::define("StartSessionRequest", |v| {
        let [request, session, user] = v.vars(["request", "session", "user"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_START_SESSION).with("session", session),
                fields! { "request" => request },
            )
            .refine(Where::new().query(
                SessionLogging::GET_USER,
                fields! { "session" => session },
                fields! { "user" => user },
            ))
            .then(SessionLogging::START_SESSION, fields! { "user" => user })
    })
}

/// Resolves `session` to `user` and keeps frames where `user` owns
/// `session_id`.
pub(crate) fn owned_by_caller(session: Var, session_id: Var, user: Var, details: Var) -> Where {
    Where::new()
        .query(
            SessionLogging::GET_USER,
            fields! { "session" => session },
            fields! { "user" => user },
        )
        .query(
            SessionLogging::GET_SESSION_DETAILS,
            fields! { "session" => session_id },
            fields! { "sessionDetails" => details },
        )
        .filter(move |f| {
            let owner = f
                .get(details)
                .and_then(|d| d.as_record())
                .and_then(|d| d.get_str("owner"));
            owner.is_some() && owner == f.get_str(user)
        })
}

fn add_entry_by_session() -> SyncRule {
    SyncRule::define("AddEntryRequest", |v| {
        let [request, session, session_id, entry] =
            v.vars(["request", "session", "sessionId", "entry"]);
        let [user, details] = v.vars(["user", "sessionDetails"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_ADD_ENTRY)
                    .with("session", session)
                    .with("sessionId", session_id)
                    .with("entry", entry),
                fields! { "request" => request },
            )
            .refine(owned_by_caller(session, session_id, user, details))
            .then(
                SessionLogging::ADD_ENTRY,
                fields! { "user" => user, "session" => session_id, "image" => entry },
            )
    })
}

fn end_by_session() -> SyncRule {
    SyncRule::define("EndSessionRequest", |v| {
        let [request, session, session_id, user, details] =
            v.vars(["request", "session", "sessionId", "user", "sessionDetails"]);
        SyncBody::new()
            .when_done(
                Requesting::REQUEST,
                request_on(API_END_SESSION)
                    .with("session", session)
                    .with("sessionId", session_id),
                fields! { "request" => request },
            )
            .refine(owned_by_caller(session, session_id, user, details))
            .then(
                SessionLogging::END_SESSION,
                fields! { "user" => user, "session" => session_id },
            )
    })
}
