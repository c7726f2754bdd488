use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a reviewer as reported by the auth gate (e.g. a username).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Group that unlocks the admin-only operations (listing, reopen).
pub const ADMIN_GROUP: &str = "admins";

/// Authenticated caller: who they are and which groups they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub worker: WorkerId,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(worker: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            worker: WorkerId::new(worker),
            groups,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.groups.iter().any(|g| g == ADMIN_GROUP)
    }
}
