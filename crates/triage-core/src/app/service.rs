//! TriageService - HTTP ルートが呼ぶ表面
//!
//! | route                    | method        | auth     |
//! |--------------------------|---------------|----------|
//! | GET next-task            | `next_task`   | worker   |
//! | GET all-tasks            | `all_tasks`   | admins   |
//! | POST task/{id}/resolve   | `resolve`     | worker   |
//! | POST abandon {id}        | `abandon`     | worker   |
//! | PUT task {content}       | `create`      | none     |
//! | POST task/{id}/reopen    | `reopen`      | admins   |
//!
//! 「取れるタスクがない」「もう解決済みだった」は `Ok(None)` でありエラーではありません。

use std::sync::Arc;

use tracing::debug;

use super::engine::{ClaimEngine, ResolveOutcome};
use super::intake::{Intake, IntakeRequest};
use crate::domain::{Principal, Task, TaskId, TaskStatus, TriageError};
use crate::ports::{AuthGate, Clock};

pub struct TriageService {
    engine: Arc<ClaimEngine>,
    intake: Intake,
    auth: Arc<dyn AuthGate>,
    clock: Arc<dyn Clock>,
}

impl TriageService {
    pub fn new(
        engine: Arc<ClaimEngine>,
        intake: Intake,
        auth: Arc<dyn AuthGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            intake,
            auth,
            clock,
        }
    }

    pub async fn next_task(&self, credential: &str) -> Result<Option<Task>, TriageError> {
        let principal = self.auth.authenticate(credential).await?;
        self.engine
            .request_next(&principal.worker, self.clock.now())
            .await
    }

    /// Every task, oldest email first.
    pub async fn all_tasks(&self, credential: &str) -> Result<Vec<Task>, TriageError> {
        let principal = self.auth.authenticate(credential).await?;
        require_admin(&principal)?;
        let mut tasks = self.engine.list_all().await?;
        tasks.sort_by(|a, b| {
            a.content
                .received_at
                .cmp(&b.content.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    /// `Ok(None)` when someone else already settled the task: the caller gets an
    /// empty payload, not an error.
    pub async fn resolve(
        &self,
        credential: &str,
        id: &str,
        status: TaskStatus,
    ) -> Result<Option<ResolveOutcome>, TriageError> {
        let principal = self.auth.authenticate(credential).await?;
        let id = parse_id(id)?;
        match self
            .engine
            .resolve(id, &principal.worker, status, self.clock.now())
            .await
        {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TriageError::Conflict(_)) => {
                debug!(task_id = %id, worker = %principal.worker, "resolve lost to an earlier verdict");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The reviewer is stepping away from `id`.
    pub async fn abandon(&self, credential: &str, id: &str) -> Result<Task, TriageError> {
        let principal = self.auth.authenticate(credential).await?;
        let id = parse_id(id)?;
        self.engine.release(id, &principal.worker).await
    }

    /// Unauthenticated: called by the mail intake hook.
    pub async fn create(&self, request: IntakeRequest) -> Result<Task, TriageError> {
        self.intake.submit(request).await
    }

    pub async fn reopen(&self, credential: &str, id: &str) -> Result<Task, TriageError> {
        let principal = self.auth.authenticate(credential).await?;
        require_admin(&principal)?;
        let id = parse_id(id)?;
        self.engine.reopen(id).await
    }
}

fn require_admin(principal: &Principal) -> Result<(), TriageError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(TriageError::Unauthorized(format!(
            "{} is not in the admins group",
            principal.worker
        )))
    }
}

fn parse_id(raw: &str) -> Result<TaskId, TriageError> {
    raw.parse()
        .map_err(|err| TriageError::InvalidRequest(format!("{err}")))
}
