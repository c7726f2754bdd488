//! Domain model (ids, worker identity, task record, status, errors).

pub mod errors;
pub mod ids;
pub mod state;
pub mod task;
pub mod worker;

pub use self::errors::{ErrorKind, TriageError};
pub use self::ids::{ParseIdError, TaskId};
pub use self::state::TaskStatus;
pub use self::task::{
    ClaimKind, ClaimProbe, EmailContent, Lease, Resolution, Task, Timestamp, TransitionError,
};
pub use self::worker::{ADMIN_GROUP, Principal, WorkerId};
