//! Persistent collections with structural sharing.
//!
//! These are thin wrappers around the `im` crate's persistent data structures.
//! [`Record`] is the named-field record every action input, action output and
//! query row is expressed in; [`List`] backs list-valued fields.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::{Value, ValueKind};

/// Field name of the business-error shape `{error: string}`.
pub const ERROR_FIELD: &str = "error";

// =============================================================================
// List
// =============================================================================

/// Persistent list of values.
///
/// Cloning is O(1). Modifications return a new list sharing structure
/// with the original.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct List(im::Vector<Value>);

impl List {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(im::Vector::new())
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets an element by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Returns a new list with the element appended.
    #[must_use]
    pub fn push_back(&self, value: Value) -> Self {
        let mut new = self.0.clone();
        new.push_back(value);
        Self(new)
    }

    /// Returns true if the list contains the value.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Returns an iterator over elements.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Hash for List {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for v in self.iter() {
            v.hash(state);
        }
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(im::Vector::from_iter(iter))
    }
}

// =============================================================================
// Record
// =============================================================================

/// Named-field record with deterministic (sorted) field order.
///
/// Cloning is O(1).
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record(im::OrdMap<Arc<str>, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(im::OrdMap::new())
    }

    /// Creates the business-error shape `{error: message}`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new().with(ERROR_FIELD, message.into())
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns true if the record has the field.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Sets a field in place.
    pub fn set(&mut self, field: impl Into<Arc<str>>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns a new record without the field.
    #[must_use]
    pub fn without(&self, field: &str) -> Self {
        let mut new = self.0.clone();
        new.remove(field);
        Self(new)
    }

    /// Returns a new record with every field of `other` layered over this one.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (field, value) in &other.0 {
            merged.insert(field.clone(), value.clone());
        }
        Self(merged)
    }

    /// Returns an iterator over (field, value) pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Returns an iterator over field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(AsRef::as_ref)
    }

    /// Returns true if this is a business-error record.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.contains(ERROR_FIELD)
    }

    /// Returns the business-error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.get_str(ERROR_FIELD)
    }

    /// Gets a string field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Gets a non-empty string field.
    #[must_use]
    pub fn get_nonempty_str(&self, field: &str) -> Option<&str> {
        self.get_str(field).filter(|s| !s.is_empty())
    }

    /// Gets an integer field.
    #[must_use]
    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    /// Gets a boolean field.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Gets a list field.
    #[must_use]
    pub fn get_list(&self, field: &str) -> Option<&List> {
        self.get(field).and_then(Value::as_list)
    }

    /// Gets a nested record field.
    #[must_use]
    pub fn get_record(&self, field: &str) -> Option<&Record> {
        self.get(field).and_then(Value::as_record)
    }

    /// Gets a string field, failing if it is missing or of the wrong kind.
    ///
    /// # Errors
    /// Returns an invalid-input error naming the field.
    pub fn require_str(&self, field: &str) -> crate::Result<&str> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(Error::invalid_input(field, ValueKind::String, Some(other.kind()))),
            None => Err(Error::invalid_input(field, ValueKind::String, None)),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v:?}")?;
        }
        write!(f, "}}")
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (k, v) in self.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Builds a [`Record`] from `field => value` pairs.
///
/// ```
/// use hatch_foundation::{record, Value};
/// let r = record! { "user" => "u1", "size" => 3 };
/// assert_eq!(r.get("size"), Some(&Value::Int(3)));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($field:expr => $value:expr),+ $(,)?) => {
        $crate::Record::new()$(.with($field, $value))+
    };
}
