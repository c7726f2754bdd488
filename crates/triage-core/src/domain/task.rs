//! Task record: email content + lease + resolution.
//!
//! All state transitions live here as pure methods. A store adapter applies
//! them inside its own atomic section, so every backend shares the same rules.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus, WorkerId};

pub type Timestamp = DateTime<Utc>;

/// Immutable content of an inbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub address: String,
    pub subject: String,
    pub body: String,
    pub received_at: Timestamp,
}

/// Time-bounded exclusive working rights over a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: WorkerId,
    pub assigned_at: Timestamp,
}

impl Lease {
    pub fn new(owner: WorkerId, assigned_at: Timestamp) -> Self {
        Self { owner, assigned_at }
    }

    /// A lease assigned at `t` is expired from `t + ttl` on (inclusive).
    pub fn is_expired(&self, now: Timestamp, ttl: TimeDelta) -> bool {
        now - self.assigned_at >= ttl
    }

    pub fn is_owned_by(&self, worker: &WorkerId) -> bool {
        &self.owner == worker
    }
}

/// Who resolved the task and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved_by: WorkerId,
    pub resolved_at: Timestamp,
}

/// The (requester, now, ttl) triple the claim eligibility predicate is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimProbe {
    pub requester: WorkerId,
    pub now: Timestamp,
    pub ttl: TimeDelta,
}

impl ClaimProbe {
    pub fn new(requester: WorkerId, now: Timestamp, ttl: TimeDelta) -> Self {
        Self {
            requester,
            now,
            ttl,
        }
    }
}

/// How a successful claim treated the existing lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// No usable lease existed; `assigned_at` was set to now.
    Fresh,
    /// The requester already held a live lease; `assigned_at` was kept.
    Renewed,
}

/// Why a transition was refused. Stores surface all of these as a conflict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("task is no longer pending")]
    NotPending,

    #[error("task is already pending")]
    AlreadyPending,

    #[error("lease changed since it was observed")]
    LeaseChanged,

    #[error("task is leased by another worker")]
    LeasedElsewhere,

    #[error("status {0} is not terminal")]
    NotTerminal(TaskStatus),
}

/// One inbound email and its triage state.
///
/// Invariants:
/// - `resolution.is_some()` iff `status != Pending`
/// - `lease.is_some()` only while `status == Pending`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: EmailContent,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl Task {
    pub fn new(id: TaskId, content: EmailContent) -> Self {
        Self {
            id,
            content,
            status: TaskStatus::Pending,
            lease: None,
            resolution: None,
        }
    }

    /// Pending, and either unleased, expired, or already leased to the requester.
    pub fn is_claimable_by(&self, probe: &ClaimProbe) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        match &self.lease {
            None => true,
            Some(lease) => {
                lease.is_owned_by(&probe.requester) || lease.is_expired(probe.now, probe.ttl)
            }
        }
    }

    /// Assign (or renew) the lease for `probe.requester`.
    ///
    /// `observed` is the lease the caller saw when it selected this task; the
    /// claim is refused if the stored lease has changed since.
    pub fn claim(
        &mut self,
        probe: &ClaimProbe,
        observed: Option<&Lease>,
    ) -> Result<ClaimKind, TransitionError> {
        if self.status != TaskStatus::Pending {
            return Err(TransitionError::NotPending);
        }
        if self.lease.as_ref() != observed {
            return Err(TransitionError::LeaseChanged);
        }
        if !self.is_claimable_by(probe) {
            return Err(TransitionError::LeasedElsewhere);
        }

        let (assigned_at, kind) = match &self.lease {
            Some(lease)
                if lease.is_owned_by(&probe.requester)
                    && !lease.is_expired(probe.now, probe.ttl) =>
            {
                (lease.assigned_at, ClaimKind::Renewed)
            }
            _ => (probe.now, ClaimKind::Fresh),
        };
        self.lease = Some(Lease::new(probe.requester.clone(), assigned_at));
        Ok(kind)
    }

    /// Drop the lease, whoever holds it. Returns the previous lease.
    pub fn release(&mut self) -> Option<Lease> {
        self.lease.take()
    }

    /// Terminal transition: record the resolution and clear the lease.
    pub fn resolve(
        &mut self,
        status: TaskStatus,
        resolved_by: WorkerId,
        resolved_at: Timestamp,
    ) -> Result<(), TransitionError> {
        if !status.is_terminal() {
            return Err(TransitionError::NotTerminal(status));
        }
        if self.status.is_terminal() {
            return Err(TransitionError::NotPending);
        }
        self.status = status;
        self.lease = None;
        self.resolution = Some(Resolution {
            resolved_by,
            resolved_at,
        });
        Ok(())
    }

    /// Administrative reset of a terminal task back into the claimable pool.
    pub fn reopen(&mut self) -> Result<(), TransitionError> {
        if !self.status.is_terminal() {
            return Err(TransitionError::AlreadyPending);
        }
        self.status = TaskStatus::Pending;
        self.lease = None;
        self.resolution = None;
        Ok(())
    }
}
