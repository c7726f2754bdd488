//! InMemoryTaskStore - 開発用・テスト用のタスクストア
//!
//! # 実装詳細
//! - `HashMap<TaskId, Task>` を tokio の Mutex で保護
//! - 条件付き更新は「ロック取得 → 条件評価 → 書き込み」を 1 回のロック内で完結
//! - ロックがこのストア唯一の直列化点（エンジン側にロックはない）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ClaimKind, ClaimProbe, Lease, Task, TaskId, TaskStatus, Timestamp, TransitionError, WorkerId,
};
use crate::ports::{StoreError, TaskStore};

struct InMemoryStoreState {
    tasks: HashMap<TaskId, Task>,

    /// When set, every operation fails with `StoreError::Unavailable`.
    outage: Option<String>,
}

impl InMemoryStoreState {
    fn check_available(&self) -> Result<(), StoreError> {
        match &self.outage {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Apply `transition` to a copy of the stored task and write it back only on success.
    fn update<R, F>(&mut self, id: TaskId, transition: F) -> Result<(Task, R), StoreError>
    where
        F: FnOnce(&mut Task) -> Result<R, TransitionError>,
    {
        self.check_available()?;
        let stored = self.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        let mut next = stored.clone();
        let detail = transition(&mut next).map_err(|_| StoreError::Conflict)?;
        *stored = next.clone();
        Ok((next, detail))
    }
}

#[derive(Clone)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState {
                tasks: HashMap::new(),
                outage: None,
            })),
        }
    }

    /// Simulate (or end) a backend outage.
    pub async fn set_outage(&self, reason: Option<String>) {
        self.state.lock().await.outage = reason;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_eligible(&self, probe: &ClaimProbe) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.is_claimable_by(probe))
            .cloned()
            .collect())
    }

    async fn try_claim(
        &self,
        id: TaskId,
        probe: &ClaimProbe,
        observed: Option<&Lease>,
    ) -> Result<(Task, ClaimKind), StoreError> {
        let mut state = self.state.lock().await;
        state.update(id, |task| task.claim(probe, observed))
    }

    async fn try_resolve(
        &self,
        id: TaskId,
        status: TaskStatus,
        resolved_by: &WorkerId,
        now: Timestamp,
    ) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        state
            .update(id, |task| task.resolve(status, resolved_by.clone(), now))
            .map(|(task, ())| task)
    }

    async fn try_release(&self, id: TaskId) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        state
            .update(id, |task| {
                task.release();
                Ok(())
            })
            .map(|(task, ())| task)
    }

    async fn try_reopen(&self, id: TaskId) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        state.update(id, Task::reopen).map(|(task, ())| task)
    }

    async fn insert(&self, task: Task) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateId);
        }
        state.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.tasks.values().cloned().collect())
    }
}
