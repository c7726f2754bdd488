//! TaskStore port - タスク記録の正本（source of truth）
//!
//! エンジン自身は状態を持たず、協調に必要な状態はすべてここに置きます。
//! 変更はすべて「条件チェック + 書き込み」を 1 回の不可分操作で行います。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    ClaimKind, ClaimProbe, Lease, Task, TaskId, TaskStatus, Timestamp, TriageError, WorkerId,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The condition did not hold at write time; nothing was written.
    #[error("conditional update rejected")]
    Conflict,

    #[error("no such task")]
    NotFound,

    #[error("id already in use")]
    DuplicateId,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Attach the task id the failed operation was about.
    pub fn for_task(self, id: TaskId) -> TriageError {
        match self {
            StoreError::Conflict => TriageError::Conflict(id),
            StoreError::NotFound => TriageError::NotFound(id),
            StoreError::DuplicateId => TriageError::DuplicateId(id),
            StoreError::Unavailable(msg) => TriageError::StoreUnavailable(msg),
        }
    }
}

/// TaskStore は scan と条件付き更新だけを公開する
///
/// # 設計原則
/// - `try_*` はすべて、現在の保存状態に対して条件を再評価してから書く
/// - 条件が成り立たなければ何も書かずに `Conflict`
/// - 並び順の保証はしない（優先度はエンジンの責務）
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks `probe.requester` could claim at `probe.now`, in no particular order.
    async fn find_eligible(&self, probe: &ClaimProbe) -> Result<Vec<Task>, StoreError>;

    /// Lease `id` to `probe.requester` if it is still pending, its lease is
    /// still `observed`, and it is still claimable at `probe.now`.
    /// `ClaimKind::Renewed` means the requester already held it.
    async fn try_claim(
        &self,
        id: TaskId,
        probe: &ClaimProbe,
        observed: Option<&Lease>,
    ) -> Result<(Task, ClaimKind), StoreError>;

    /// Move a pending task to a terminal `status`, clearing its lease.
    async fn try_resolve(
        &self,
        id: TaskId,
        status: TaskStatus,
        resolved_by: &WorkerId,
        now: Timestamp,
    ) -> Result<Task, StoreError>;

    /// Clear the lease regardless of owner. Idempotent.
    async fn try_release(&self, id: TaskId) -> Result<Task, StoreError>;

    /// Reset a terminal task to pending with no lease and no resolution.
    async fn try_reopen(&self, id: TaskId) -> Result<Task, StoreError>;

    /// Create a task. Fails only on id collision.
    async fn insert(&self, task: Task) -> Result<(), StoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Task>, StoreError>;
}
