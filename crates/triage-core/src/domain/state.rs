//! Task status taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Triage status of an email.
///
/// State transitions:
/// - Pending -> Positive | Neutral | Negative (resolve)
/// - Positive | Neutral | Negative -> Pending (admin reopen only)
///
/// Pending is the only state a worker can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for a reviewer (possibly leased).
    Pending,

    /// Lead is interested; forward to sales.
    Positive,

    /// Lead is undecided; forward to sales.
    Neutral,

    /// Lead is not interested.
    Negative,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Positive,
        TaskStatus::Neutral,
        TaskStatus::Negative,
    ];

    /// Is this a terminal state (no further worker transitions)?
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    /// Does resolving with this status require an outbound notification?
    pub fn requires_notification(self) -> bool {
        matches!(self, TaskStatus::Positive | TaskStatus::Neutral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Positive => "positive",
            TaskStatus::Neutral => "neutral",
            TaskStatus::Negative => "negative",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
