//! Identities: concept actions, concept queries, invocations and flows.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Action and Query References
// =============================================================================

/// Identity of a concept action: the `(concept, action)` pair.
///
/// Declared as constants by concept crates, e.g.
/// `pub const CREATE: ActionRef = ActionRef::new("Posting", "create");`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActionRef {
    concept: Cow<'static, str>,
    action: Cow<'static, str>,
}

impl ActionRef {
    /// Creates an action reference from static names.
    #[must_use]
    pub const fn new(concept: &'static str, action: &'static str) -> Self {
        Self {
            concept: Cow::Borrowed(concept),
            action: Cow::Borrowed(action),
        }
    }

    /// Creates an action reference from runtime names.
    #[must_use]
    pub fn owned(concept: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            concept: Cow::Owned(concept.into()),
            action: Cow::Owned(action.into()),
        }
    }

    /// Returns the concept name.
    #[must_use]
    pub fn concept(&self) -> &str {
        &self.concept
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Debug for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.action)
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.action)
    }
}

/// Identity of a concept query: the `(concept, query)` pair.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueryRef {
    concept: Cow<'static, str>,
    query: Cow<'static, str>,
}

impl QueryRef {
    /// Creates a query reference from static names.
    #[must_use]
    pub const fn new(concept: &'static str, query: &'static str) -> Self {
        Self {
            concept: Cow::Borrowed(concept),
            query: Cow::Borrowed(query),
        }
    }

    /// Returns the concept name.
    #[must_use]
    pub fn concept(&self) -> &str {
        &self.concept
    }

    /// Returns the query name.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Debug for QueryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.query)
    }
}

impl fmt::Display for QueryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.query)
    }
}

// =============================================================================
// Invocation and Flow Ids
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(Arc<str>);

        impl $name {
            /// Wraps an existing id string.
            #[must_use]
            pub fn new(id: impl Into<Arc<str>>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s.into())
            }
        }

        impl From<$name> for crate::Value {
            fn from(id: $name) -> Self {
                crate::Value::String(id.0)
            }
        }
    };
}

string_id!(
    /// Unique id of one action invocation. Immutable once assigned.
    InvocationId
);

string_id!(
    /// Correlation id shared by every invocation in one logical request.
    FlowId
);

// =============================================================================
// Id Minting
// =============================================================================

/// Mints UUID-formatted ids from a `ChaCha8` generator.
///
/// Seeded minters produce the same id sequence on every run.
#[derive(Debug)]
pub struct IdMinter {
    rng: Mutex<ChaCha8Rng>,
}

impl IdMinter {
    /// Creates a minter seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Creates a deterministic minter.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Creates a minter from an optional seed.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Mints a fresh UUID string.
    #[must_use]
    pub fn uuid(&self) -> String {
        let mut bytes = [0u8; 16];
        self.rng.lock().fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .hyphenated()
            .to_string()
    }

    /// Mints a fresh invocation id.
    #[must_use]
    pub fn invocation(&self) -> InvocationId {
        InvocationId::from(self.uuid())
    }

    /// Mints a fresh flow id.
    #[must_use]
    pub fn flow(&self) -> FlowId {
        FlowId::from(self.uuid())
    }
}

impl Default for IdMinter {
    fn default() -> Self {
        Self::from_entropy()
    }
}
