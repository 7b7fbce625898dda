//! Username/password accounts.

use std::fmt::Write as _;

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, QueryRef, Record, Result, record};
use im::OrdMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Clone, Debug)]
struct Account {
    username: String,
    salt: String,
    digest: String,
}

#[derive(Default)]
struct State {
    accounts: OrdMap<String, Account>,
    by_username: OrdMap<String, String>,
}

/// The password authentication concept.
///
/// Passwords are kept as salted SHA-256 digests, never in clear.
pub struct PasswordAuthentication {
    ids: IdMinter,
    state: RwLock<State>,
}

impl PasswordAuthentication {
    /// Concept name.
    pub const NAME: &'static str = "PasswordAuthentication";
    /// `register{username, password} → {user}`
    pub const REGISTER: ActionRef = ActionRef::new(Self::NAME, "register");
    /// `authenticate{username, password} → {user}`
    pub const AUTHENTICATE: ActionRef = ActionRef::new(Self::NAME, "authenticate");
    /// `_getUserByUsername{username} → [{user, username}]`
    pub const GET_USER_BY_USERNAME: QueryRef = QueryRef::new(Self::NAME, "_getUserByUsername");
    /// `_getUserById{user} → [{user, username}]`
    pub const GET_USER_BY_ID: QueryRef = QueryRef::new(Self::NAME, "_getUserById");
    /// `_userExistsByUsername{username} → [{exists}]`
    pub const USER_EXISTS_BY_USERNAME: QueryRef =
        QueryRef::new(Self::NAME, "_userExistsByUsername");
    /// `_userExistsById{user} → [{exists}]`
    pub const USER_EXISTS_BY_ID: QueryRef = QueryRef::new(Self::NAME, "_userExistsById");
    /// `_getAllUsers{} → [{user, username}]`, ordered by username
    pub const GET_ALL_USERS: QueryRef = QueryRef::new(Self::NAME, "_getAllUsers");

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

    fn credentials(input: &Record) -> Option<(&str, &str)> {
        Some((
            input.get_nonempty_str("username")?,
            input.get_nonempty_str("password")?,
        ))
    }

    fn register(&self, input: &Record) -> Record {
        let Some((username, password)) = Self::credentials(input) else {
            return Record::error("Username and password must be provided.");
        };
        let mut state = self.state.write();
        if state.by_username.contains_key(username) {
            return Record::error("Username already exists.");
        }
        let user = self.ids.uuid();
        let salt = self.ids.uuid();
        let account = Account {
            username: username.to_string(),
            digest: digest(&salt, password),
            salt,
        };
        state.by_username.insert(username.to_string(), user.clone());
        state.accounts.insert(user.clone(), account);
        debug!(user = %user, username, "user registered");
        record! { "user" => user }
    }

    fn authenticate(&self, input: &Record) -> Record {
        const INVALID: &str = "Invalid username or password.";
        let Some((username, password)) = Self::credentials(input) else {
            return Record::error(INVALID);
        };
        let state = self.state.read();
        let account = state
            .by_username
            .get(username)
            .and_then(|user| state.accounts.get(user).map(|a| (user, a)));
        match account {
            Some((user, account)) if account.digest == digest(&account.salt, password) => {
                record! { "user" => user.as_str() }
            }
            _ => Record::error(INVALID),
        }
    }

    fn user_row(user: &str, account: &Account) -> Record {
        record! { "user" => user, "username" => account.username.as_str() }
    }

    fn by_username(&self, input: &Record) -> Result<Vec<Record>> {
        let username = input.require_str("username")?;
        let state = self.state.read();
        Ok(state
            .by_username
            .get(username)
            .and_then(|user| state.accounts.get(user).map(|a| Self::user_row(user, a)))
            .into_iter()
            .collect())
    }

    fn by_id(&self, input: &Record) -> Result<Vec<Record>> {
        let user = input.require_str("user")?;
        Ok(self
            .state
            .read()
            .accounts
            .get(user)
            .map(|a| Self::user_row(user, a))
            .into_iter()
            .collect())
    }

    fn all_users(&self) -> Vec<Record> {
        let state = self.state.read();
        state
            .by_username
            .values()
            .filter_map(|user| state.accounts.get(user).map(|a| Self::user_row(user, a)))
            .collect()
    }
}

impl Default for PasswordAuthentication {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in hasher.finalize() {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[async_trait]
impl Concept for PasswordAuthentication {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["register", "authenticate"]
    }

    fn queries(&self) -> &[&'static str] {
        &[
            "_getUserByUsername",
            "_getUserById",
            "_userExistsByUsername",
            "_userExistsById",
            "_getAllUsers",
        ]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "register" => Ok(self.register(&input)),
            "authenticate" => Ok(self.authenticate(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_getUserByUsername" => self.by_username(&input),
            "_getUserById" => self.by_id(&input),
            "_userExistsByUsername" => {
                let exists = !self.by_username(&input)?.is_empty();
                Ok(vec![record! { "exists" => exists }])
            }
            "_userExistsById" => {
                let exists = !self.by_id(&input)?.is_empty();
                Ok(vec![record! { "exists" => exists }])
            }
            "_getAllUsers" => Ok(self.all_users()),
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
