//! ReviewerLoop - エンジンをポーリングするレビュアー群
//!
//! # フロー
//! 1. ClaimEngine::request_next() でタスクを取得（なければ poll_interval 待つ）
//! 2. Reviewer::review() で判定
//! 3. Some(status) なら resolve、None なら release

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::engine::ClaimEngine;
use crate::domain::{Task, TaskStatus, WorkerId};
use crate::ports::Clock;

/// Decides what to do with a claimed email. `None` abandons it.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, reviewer: &WorkerId, task: &Task) -> Option<TaskStatus>;
}

/// Reviewer group handle.
/// - `request_shutdown()` で新しいタスクの取得を止める
/// - `shutdown_and_join()` で全レビュアーの終了を待てる
pub struct ReviewerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl ReviewerGroup {
    /// Spawn one loop per reviewer identity.
    pub fn spawn(
        reviewers: Vec<WorkerId>,
        engine: Arc<ClaimEngine>,
        clock: Arc<dyn Clock>,
        reviewer: Arc<dyn Reviewer>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = reviewers
            .into_iter()
            .map(|worker| {
                let ctx = LoopContext {
                    worker,
                    engine: Arc::clone(&engine),
                    clock: Arc::clone(&clock),
                    reviewer: Arc::clone(&reviewer),
                    poll_interval,
                };
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move { ctx.run(&mut rx).await })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    /// Stop taking new tasks. In-flight reviews finish.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

struct LoopContext {
    worker: WorkerId,
    engine: Arc<ClaimEngine>,
    clock: Arc<dyn Clock>,
    reviewer: Arc<dyn Reviewer>,
    poll_interval: Duration,
}

impl LoopContext {
    async fn run(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender が drop されたら停止扱い
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.engine.request_next(&self.worker, self.clock.now()) => next,
            };

            let task = match next {
                Ok(Some(task)) => task,
                Ok(None) => {
                    self.idle(shutdown_rx).await;
                    continue;
                }
                Err(err) => {
                    warn!(worker = %self.worker, error = %err, kind = ?err.kind(), "request_next failed");
                    self.idle(shutdown_rx).await;
                    continue;
                }
            };

            match self.reviewer.review(&self.worker, &task).await {
                Some(status) => {
                    let resolved = self
                        .engine
                        .resolve(task.id, &self.worker, status, self.clock.now())
                        .await;
                    if let Err(err) = resolved {
                        warn!(worker = %self.worker, task_id = %task.id, error = %err, kind = ?err.kind(), "resolve failed");
                    }
                }
                None => {
                    if let Err(err) = self.engine.release(task.id, &self.worker).await {
                        warn!(worker = %self.worker, task_id = %task.id, error = %err, kind = ?err.kind(), "release failed");
                    }
                }
            }
        }
        debug!(worker = %self.worker, "reviewer stopped");
    }

    async fn idle(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = tokio::time::sleep(self.poll_interval) => {}
        }
    }
}
