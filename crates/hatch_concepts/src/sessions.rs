//! Logging sessions: a user opens a session, records image entries into it
//! while it is active, then ends it. Entries outlive the session.

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{
    ActionRef, Error, IdMinter, List, QueryRef, Record, Result, Value, record,
};
use im::{OrdMap, Vector};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
struct Session {
    owner: String,
    active: bool,
    entries: Vector<String>,
    start_time: Option<Value>,
    location: Option<Value>,
}

impl Session {
    fn details(&self, id: &str) -> Record {
        let entries: List = self.entries.iter().map(|e| Value::from(e.as_str())).collect();
        let mut details = record! {
            "session" => id,
            "owner" => self.owner.as_str(),
            "active" => self.active,
            "entries" => entries,
        };
        if let Some(start) = &self.start_time {
            details.set("startTime", start.clone());
        }
        if let Some(location) = &self.location {
            details.set("location", location.clone());
        }
        details
    }
}

#[derive(Default)]
struct State {
    sessions: OrdMap<String, Session>,
    /// Session ids in creation order.
    order: Vector<String>,
}

/// The session logging concept.
pub struct SessionLogging {
    ids: IdMinter,
    state: RwLock<State>,
}

impl SessionLogging {
    /// Concept name.
    pub const NAME: &'static str = "SessionLogging";
    /// `startSession{user, startTime?, location?} → {newSession}`
    pub const START_SESSION: ActionRef = ActionRef::new(Self::NAME, "startSession");
    /// `addEntry{user, session, image} → {newEntry}`
    pub const ADD_ENTRY: ActionRef = ActionRef::new(Self::NAME, "addEntry");
    /// `endSession{user, session} → {}`
    pub const END_SESSION: ActionRef = ActionRef::new(Self::NAME, "endSession");
    /// `_getUser{session} → [{user}]`
    pub const GET_USER: QueryRef = QueryRef::new(Self::NAME, "_getUser");
    /// `_getSessionDetails{session} → [{sessionDetails}]`
    pub const GET_SESSION_DETAILS: QueryRef = QueryRef::new(Self::NAME, "_getSessionDetails");
    /// `_getSessionsByUser{user} → [{session}]`
    pub const GET_SESSIONS_BY_USER: QueryRef = QueryRef::new(Self::NAME, "_getSessionsByUser");
    /// `_getEntriesInSession{session} → [{image}]`
    pub const GET_ENTRIES_IN_SESSION: QueryRef =
        QueryRef::new(Self::NAME, "_getEntriesInSession");
    /// `_isSessionActive{session} → [{isActive}]`
    pub const IS_SESSION_ACTIVE: QueryRef = QueryRef::new(Self::NAME, "_isSessionActive");

    /// Creates the concept.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ids(IdMinter::from_entropy())
    }

    /// Creates the concept with a specific id source.
    #[must_use]
    pub fn with_ids(ids: IdMinter) -> Self {
        Self {
            ids,
            state: RwLock::new(State::default()),
        }
    }

    fn start(&self, input: &Record) -> Record {
        let Some(user) = input.get_nonempty_str("user") else {
            return Record::error("SessionLogging: User ID must be provided.");
        };
        let session = self.ids.uuid();
        let mut state = self.state.write();
        state.sessions.insert(
            session.clone(),
            Session {
                owner: user.to_string(),
                active: true,
                entries: Vector::new(),
                start_time: input.get("startTime").cloned(),
                location: input.get("location").cloned(),
            },
        );
        state.order.push_back(session.clone());
        debug!(session = %session, user, "session started");
        record! { "newSession" => session }
    }

    /// Resolves the session an owner is acting on.
    fn owned<'s>(
        state: &'s mut State,
        user: &str,
        session: &str,
    ) -> std::result::Result<&'s mut Session, Record> {
        let found = state.sessions.get_mut(session).ok_or_else(|| {
            Record::error(format!("SessionLogging: Session with ID {session} not found."))
        })?;
        if found.owner != user {
            return Err(Record::error(format!(
                "SessionLogging: User {user} is not the owner of session {session}."
            )));
        }
        Ok(found)
    }

    fn add_entry(&self, input: &Record) -> Record {
        let (Some(user), Some(session)) = (
            input.get_nonempty_str("user"),
            input.get_nonempty_str("session"),
        ) else {
            return Record::error("SessionLogging: User and session must be provided.");
        };
        let Some(image) = input.get_nonempty_str("image") else {
            return Record::error("SessionLogging: Image must be provided.");
        };
        let mut state = self.state.write();
        let found = match Self::owned(&mut state, user, session) {
            Ok(found) => found,
            Err(error) => return error,
        };
        if !found.active {
            return Record::error(format!(
                "SessionLogging: Session with ID {session} is not active. Cannot add entries."
            ));
        }
        if found.entries.iter().any(|e| e == image) {
            return Record::error(format!(
                "SessionLogging: Image {image} is already an entry in session {session}."
            ));
        }
        found.entries.push_back(image.to_string());
        record! { "newEntry" => image }
    }

    fn end(&self, input: &Record) -> Record {
        let (Some(user), Some(session)) = (
            input.get_nonempty_str("user"),
            input.get_nonempty_str("session"),
        ) else {
            return Record::error("SessionLogging: User and session must be provided.");
        };
        let mut state = self.state.write();
        let found = match Self::owned(&mut state, user, session) {
            Ok(found) => found,
            Err(error) => return error,
        };
        if !found.active {
            return Record::error(format!(
                "SessionLogging: Session with ID {session} is already inactive."
            ));
        }
        found.active = false;
        debug!(session, "session ended");
        Record::new()
    }

    fn with_session<T>(&self, session: &str, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.state.read().sessions.get(session).map(f)
    }
}

impl Default for SessionLogging {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for SessionLogging {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["startSession", "addEntry", "endSession"]
    }

    fn queries(&self) -> &[&'static str] {
        &[
            "_getUser",
            "_getSessionDetails",
            "_getSessionsByUser",
            "_getEntriesInSession",
            "_isSessionActive",
        ]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "startSession" => Ok(self.start(&input)),
            "addEntry" => Ok(self.add_entry(&input)),
            "endSession" => Ok(self.end(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        let rows = match query {
            "_getUser" => {
                let session = input.require_str("session")?;
                self.with_session(session, |s| vec![record! { "user" => s.owner.as_str() }])
            }
            "_getSessionDetails" => {
                let session = input.require_str("session")?;
                self.with_session(session, |s| {
                    vec![record! { "sessionDetails" => s.details(session) }]
                })
            }
            "_getEntriesInSession" => {
                let session = input.require_str("session")?;
                self.with_session(session, |s| {
                    s.entries
                        .iter()
                        .map(|e| record! { "image" => e.as_str() })
                        .collect()
                })
            }
            "_isSessionActive" => {
                let session = input.require_str("session")?;
                self.with_session(session, |s| vec![record! { "isActive" => s.active }])
            }
            "_getSessionsByUser" => {
                let user = input.require_str("user")?;
                let state = self.state.read();
                Some(
                    state
                        .order
                        .iter()
                        .filter(|id| state.sessions.get(*id).is_some_and(|s| s.owner == user))
                        .map(|id| record! { "session" => id.as_str() })
                        .collect(),
                )
            }
            _ => return Err(Error::unknown_query(Self::NAME, query)),
        };
        Ok(rows.unwrap_or_default())
    }
}
