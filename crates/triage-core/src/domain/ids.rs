//! TaskId - タスク（受信メール）の識別子
//!
//! 中身は ULID。先頭 48 bit が生成時刻なので、同じ受信時刻のメール同士は
//! id 順に並べるだけで「先に登録されたもの」が先頭に来ます。
//!
//! 表示形式は `email-<ULID>`。JSON では素の ULID 文字列になります。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    pub const DISPLAY_PREFIX: &'static str = "email-";

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::DISPLAY_PREFIX, self.0)
    }
}

/// Error returned when a path segment is not a task id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task id: {0}")]
pub struct ParseIdError(pub String);

/// Both `email-01H...` and a bare ULID are accepted.
impl FromStr for TaskId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(Self::DISPLAY_PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}
