//! Friend requests and friendships.
//!
//! Friendships are undirected and stored as canonical pairs, lesser user
//! first. Requests are directed from sender to receiver.

use async_trait::async_trait;
use hatch_engine::Concept;
use hatch_foundation::{ActionRef, Error, IdMinter, QueryRef, Record, Result, record};
use im::{OrdMap, OrdSet};
use parking_lot::RwLock;
use tracing::debug;

type Pair = (String, String);

#[derive(Default)]
struct State {
    /// `(sender, receiver)` to request id.
    requests: OrdMap<Pair, String>,
    friendships: OrdSet<Pair>,
}

fn canonical(a: &str, b: &str) -> Pair {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn directed(sender: &str, receiver: &str) -> Pair {
    (sender.to_string(), receiver.to_string())
}

/// The friending concept.
pub struct Friending {
    ids: IdMinter,
    state: RwLock<State>,
}

impl Friending {
    /// Concept name.
    pub const NAME: &'static str = "Friending";
    /// `sendRequest{sender, receiver} → {request}`
    pub const SEND_REQUEST: ActionRef = ActionRef::new(Self::NAME, "sendRequest");
    /// `acceptRequest{sender, receiver} → {}`
    pub const ACCEPT_REQUEST: ActionRef = ActionRef::new(Self::NAME, "acceptRequest");
    /// `denyRequest{sender, receiver} → {}`
    pub const DENY_REQUEST: ActionRef = ActionRef::new(Self::NAME, "denyRequest");
    /// `removeFriend{user, to_be_removed_friend} → {}`
    pub const REMOVE_FRIEND: ActionRef = ActionRef::new(Self::NAME, "removeFriend");
    /// `_isFriends{user1, user2} → [{areFriends}]`
    pub const IS_FRIENDS: QueryRef = QueryRef::new(Self::NAME, "_isFriends");
    /// `_getFriends{user} → [{friend}]`
    pub const GET_FRIENDS: QueryRef = QueryRef::new(Self::NAME, "_getFriends");
    /// `_getSentFriendRequests{sender} → [{receiver}]`
    pub const GET_SENT_REQUESTS: QueryRef = QueryRef::new(Self::NAME, "_getSentFriendRequests");
    /// `_getReceivedFriendRequests{receiver} → [{sender}]`
    pub const GET_RECEIVED_REQUESTS: QueryRef =
        QueryRef::new(Self::NAME, "_getReceivedFriendRequests");

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

    /// Returns true if the two users are friends.
    #[must_use]
    pub fn are_friends(&self, a: &str, b: &str) -> bool {
        a != b && self.state.read().friendships.contains(&canonical(a, b))
    }

    fn parties<'a>(input: &'a Record, first: &str, second: &str) -> Option<(&'a str, &'a str)> {
        Some((input.get_nonempty_str(first)?, input.get_nonempty_str(second)?))
    }

    fn send_request(&self, input: &Record) -> Record {
        let Some((sender, receiver)) = Self::parties(input, "sender", "receiver") else {
            return Record::error("Sender and receiver must be provided.");
        };
        if sender == receiver {
            return Record::error("Sender cannot send a friend request to themselves.");
        }
        let mut state = self.state.write();
        if state.requests.contains_key(&directed(sender, receiver))
            || state.requests.contains_key(&directed(receiver, sender))
        {
            return Record::error("A friend request between these users already exists.");
        }
        if state.friendships.contains(&canonical(sender, receiver)) {
            return Record::error("Users are already friends.");
        }
        let request = self.ids.uuid();
        state
            .requests
            .insert(directed(sender, receiver), request.clone());
        debug!(sender, receiver, "friend request sent");
        record! { "request" => request }
    }

    fn answer_request(&self, input: &Record, accept: bool) -> Record {
        let Some((sender, receiver)) = Self::parties(input, "sender", "receiver") else {
            return Record::error("Sender and receiver must be provided.");
        };
        let mut state = self.state.write();
        if state.requests.remove(&directed(sender, receiver)).is_none() {
            return Record::error("Friend request does not exist.");
        }
        if accept {
            state.friendships.insert(canonical(sender, receiver));
            debug!(sender, receiver, "friend request accepted");
        }
        Record::new()
    }

    fn remove_friend(&self, input: &Record) -> Record {
        let Some((user, friend)) = Self::parties(input, "user", "to_be_removed_friend") else {
            return Record::error("User and friend must be provided.");
        };
        let mut state = self.state.write();
        if state.friendships.remove(&canonical(user, friend)).is_none() {
            return Record::error("Friendship does not exist.");
        }
        Record::new()
    }

    fn friends_of(&self, user: &str) -> Vec<Record> {
        self.state
            .read()
            .friendships
            .iter()
            .filter_map(|(a, b)| match (a == user, b == user) {
                (true, _) => Some(b),
                (_, true) => Some(a),
                _ => None,
            })
            .map(|friend| record! { "friend" => friend.as_str() })
            .collect()
    }

    fn requests_where(&self, keep: impl Fn(&Pair) -> Option<Record>) -> Vec<Record> {
        self.state.read().requests.keys().filter_map(keep).collect()
    }
}

impl Default for Friending {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Concept for Friending {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &[&'static str] {
        &["sendRequest", "acceptRequest", "denyRequest", "removeFriend"]
    }

    fn queries(&self) -> &[&'static str] {
        &[
            "_isFriends",
            "_getFriends",
            "_getSentFriendRequests",
            "_getReceivedFriendRequests",
        ]
    }

    async fn perform(&self, action: &str, input: Record) -> Result<Record> {
        match action {
            "sendRequest" => Ok(self.send_request(&input)),
            "acceptRequest" => Ok(self.answer_request(&input, true)),
            "denyRequest" => Ok(self.answer_request(&input, false)),
            "removeFriend" => Ok(self.remove_friend(&input)),
            _ => Err(Error::unknown_action(Self::NAME, action)),
        }
    }

    async fn query(&self, query: &str, input: Record) -> Result<Vec<Record>> {
        match query {
            "_isFriends" => {
                let a = input.require_str("user1")?;
                let b = input.require_str("user2")?;
                Ok(vec![record! { "areFriends" => self.are_friends(a, b) }])
            }
            "_getFriends" => Ok(self.friends_of(input.require_str("user")?)),
            "_getSentFriendRequests" => {
                let sender = input.require_str("sender")?;
                Ok(self.requests_where(|(s, r)| {
                    (s == sender).then(|| record! { "receiver" => r.as_str() })
                }))
            }
            "_getReceivedFriendRequests" => {
                let receiver = input.require_str("receiver")?;
                Ok(self.requests_where(|(s, r)| {
                    (r == receiver).then(|| record! { "sender" => s.as_str() })
                }))
            }
            _ => Err(Error::unknown_query(Self::NAME, query)),
        }
    }
}
