//! The identity seam.
//!
//! User/group directories are explicitly out of scope (spec Non-goals), so
//! an `Identity` is nothing but an opaque string the dispatcher extracts
//! from the request and the store/engine compare for equality — the same
//! "owner id, compared by equality" pattern spec §4.C specifies for job
//! ownership, generalized here to node ownership.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Identity(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
