//! Pattern variables.
//!
//! A [`Var`] is an opaque handle, never confused with a literal value. Each
//! rule declares its variables through a [`VarTable`], which interns names so
//! that diagnostics can print `?user` instead of an index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pattern variable handle.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    /// Returns the raw index of this variable within its table.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({})", self.0)
    }
}

/// Per-rule table of pattern variables.
///
/// Asking for the same name twice returns the same [`Var`].
#[derive(Clone, Debug, Default)]
pub struct VarTable {
    names: Vec<Arc<str>>,
    by_name: HashMap<Arc<str>, Var>,
}

impl VarTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variable with this name, declaring it if needed.
    ///
    /// # Panics
    ///
    /// Panics if a single rule declares more than `u32::MAX` variables.
    pub fn var(&mut self, name: &str) -> Var {
        if let Some(&var) = self.by_name.get(name) {
            return var;
        }
        let var = Var(u32::try_from(self.names.len()).expect("too many pattern variables"));
        let name: Arc<str> = name.into();
        self.names.push(name.clone());
        self.by_name.insert(name, var);
        var
    }

    /// Declares several variables at once.
    ///
    /// ```
    /// use hatch_foundation::VarTable;
    /// let mut vars = VarTable::new();
    /// let [user, post] = vars.vars(["user", "post"]);
    /// assert_ne!(user, post);
    /// ```
    pub fn vars<const N: usize>(&mut self, names: [&str; N]) -> [Var; N] {
        names.map(|name| self.var(name))
    }

    /// Returns the name of a variable.
    #[must_use]
    pub fn name(&self, var: Var) -> Option<&str> {
        self.names.get(var.0 as usize).map(AsRef::as_ref)
    }

    /// Returns a printable `?name` for a variable.
    #[must_use]
    pub fn display(&self, var: Var) -> String {
        match self.name(var) {
            Some(name) => format!("?{name}"),
            None => format!("?{}", var.0),
        }
    }

    /// Returns the number of declared variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no variables are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
