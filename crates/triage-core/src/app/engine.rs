//! ClaimEngine - lease ベースのタスク取得プロトコル
//!
//! # フロー（request_next）
//! 1. TaskStore::find_eligible() で候補を取得
//! 2. received_at 昇順、同着は id 昇順で並べる
//! 3. 先頭から TaskStore::try_claim()（条件付き更新）を試す
//! 4. Conflict なら次の候補へ（max_claim_attempts 回まで）
//!
//! エンジン自身は可変状態を持ちません。直列化はストアの条件付き更新だけです。

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{debug, info};

use super::dispatcher::NotificationDispatcher;
use crate::domain::{
    ClaimKind, ClaimProbe, Task, TaskId, TaskStatus, Timestamp, TriageError, WorkerId,
};
use crate::ports::{StoreError, TaskStore};

/// Lease timing and claim retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    /// LEASE_TTL: how long an unrenewed lease stays exclusive.
    pub ttl: TimeDelta,

    /// How many candidates one `request_next` call may try before giving up.
    pub max_claim_attempts: usize,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::seconds(120),
            max_claim_attempts: 5,
        }
    }
}

/// What `resolve` did with the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// `Pending` was requested: the task went back to the pool.
    Released(Task),

    /// Terminal status recorded.
    Resolved {
        task: Task,
        notification_dispatched: bool,
    },
}

impl ResolveOutcome {
    pub fn task(&self) -> &Task {
        match self {
            ResolveOutcome::Released(task) | ResolveOutcome::Resolved { task, .. } => task,
        }
    }
}

pub struct ClaimEngine {
    store: Arc<dyn TaskStore>,
    policy: LeasePolicy,
    dispatcher: NotificationDispatcher,
}

impl ClaimEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        policy: LeasePolicy,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            policy,
            dispatcher,
        }
    }

    pub fn policy(&self) -> LeasePolicy {
        self.policy
    }

    /// Hand `requester` the oldest task it may work on, leased to it.
    ///
    /// `Ok(None)` means nothing is available right now (including losing every
    /// race within the attempt budget); the caller should poll again later.
    pub async fn request_next(
        &self,
        requester: &WorkerId,
        now: Timestamp,
    ) -> Result<Option<Task>, TriageError> {
        let probe = ClaimProbe::new(requester.clone(), now, self.policy.ttl);

        let mut candidates = self
            .store
            .find_eligible(&probe)
            .await
            .map_err(store_unavailable)?;
        candidates.sort_by(|a, b| {
            a.content
                .received_at
                .cmp(&b.content.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        for candidate in candidates.iter().take(self.policy.max_claim_attempts) {
            match self
                .store
                .try_claim(candidate.id, &probe, candidate.lease.as_ref())
                .await
            {
                Ok((task, ClaimKind::Renewed)) => {
                    debug!(task_id = %task.id, worker = %requester, "lease renewed");
                    return Ok(Some(task));
                }
                Ok((task, ClaimKind::Fresh)) => {
                    info!(task_id = %task.id, worker = %requester, "task claimed");
                    return Ok(Some(task));
                }
                Err(StoreError::Conflict | StoreError::NotFound) => {
                    debug!(task_id = %candidate.id, worker = %requester, "lost claim race, trying next candidate");
                }
                Err(err) => return Err(err.for_task(candidate.id)),
            }
        }

        debug!(worker = %requester, candidates = candidates.len(), "no task claimed");
        Ok(None)
    }

    /// Drop whatever lease `id` carries. The requester need not be the owner.
    pub async fn release(&self, id: TaskId, requester: &WorkerId) -> Result<Task, TriageError> {
        let task = self
            .store
            .try_release(id)
            .await
            .map_err(|err| err.for_task(id))?;
        info!(task_id = %id, worker = %requester, "task released");
        Ok(task)
    }

    /// Record a verdict. `Pending` means "put it back", not "resolve as pending".
    ///
    /// A `Pending` verdict goes through `release` even when the task is already
    /// resolved: the lease (already gone) is cleared and the terminal status and
    /// resolution are left as they were. `Released` then carries that task.
    pub async fn resolve(
        &self,
        id: TaskId,
        requester: &WorkerId,
        status: TaskStatus,
        now: Timestamp,
    ) -> Result<ResolveOutcome, TriageError> {
        if !status.is_terminal() {
            return self.release(id, requester).await.map(ResolveOutcome::Released);
        }

        let task = self
            .store
            .try_resolve(id, status, requester, now)
            .await
            .map_err(|err| err.for_task(id))?;
        info!(task_id = %id, worker = %requester, status = %status, "task resolved");

        let notification_dispatched = status.requires_notification();
        if notification_dispatched {
            // 送信結果は待たない
            self.dispatcher.dispatch(&task);
        }

        Ok(ResolveOutcome::Resolved {
            task,
            notification_dispatched,
        })
    }

    /// Administrative reset of a resolved task back to pending.
    pub async fn reopen(&self, id: TaskId) -> Result<Task, TriageError> {
        let task = self
            .store
            .try_reopen(id)
            .await
            .map_err(|err| err.for_task(id))?;
        info!(task_id = %id, "task reopened");
        Ok(task)
    }

    pub async fn insert(&self, task: Task) -> Result<Task, TriageError> {
        let id = task.id;
        self.store
            .insert(task.clone())
            .await
            .map_err(|err| err.for_task(id))?;
        Ok(task)
    }

    pub async fn list_all(&self) -> Result<Vec<Task>, TriageError> {
        self.store.list_all().await.map_err(store_unavailable)
    }
}

/// Scans touch no single task, so every failure there is an infrastructure failure.
fn store_unavailable(err: StoreError) -> TriageError {
    match err {
        StoreError::Unavailable(msg) => TriageError::StoreUnavailable(msg),
        other => TriageError::StoreUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use crate::domain::{EmailContent, Lease};
    use crate::impls::{FailingNotifier, InMemoryTaskStore, RecordingNotifier};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use ulid::Ulid;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn worker(name: &str) -> WorkerId {
        WorkerId::new(name)
    }

    fn email(received_secs: i64) -> Task {
        email_with_id(TaskId::from_ulid(Ulid::new()), received_secs)
    }

    fn email_with_id(id: TaskId, received_secs: i64) -> Task {
        Task::new(
            id,
            EmailContent {
                address: "lead@example.com".into(),
                subject: format!("received at {received_secs}"),
                body: "hello".into(),
                received_at: at(received_secs),
            },
        )
    }

    struct Harness {
        store: InMemoryTaskStore,
        notifier: RecordingNotifier,
        engine: ClaimEngine,
    }

    fn harness() -> Harness {
        let store = InMemoryTaskStore::new();
        let notifier = RecordingNotifier::new();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(notifier.clone()), &NotificationConfig::default());
        let engine = ClaimEngine::new(Arc::new(store.clone()), LeasePolicy::default(), dispatcher);
        Harness {
            store,
            notifier,
            engine,
        }
    }

    async fn seed(h: &Harness, tasks: Vec<Task>) -> Vec<TaskId> {
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.id);
            h.engine.insert(task).await.unwrap();
        }
        ids
    }

    #[tokio::test]
    async fn empty_store_yields_none() {
        let h = harness();
        assert_eq!(h.engine.request_next(&worker("a"), at(0)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oldest_email_is_handed_out_first() {
        let h = harness();
        let ids = seed(&h, vec![email(5), email(1), email(3)]).await;

        let mut got = Vec::new();
        for name in ["a", "b", "c"] {
            let task = h.engine.request_next(&worker(name), at(10)).await.unwrap().unwrap();
            got.push(task.id);
        }

        assert_eq!(got, vec![ids[1], ids[2], ids[0]]);
        assert_eq!(h.engine.request_next(&worker("d"), at(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn same_received_at_breaks_ties_by_id() {
        let h = harness();
        let low = TaskId::from_ulid(Ulid::from_parts(1, 1));
        let high = TaskId::from_ulid(Ulid::from_parts(1, 2));
        seed(&h, vec![email_with_id(high, 7), email_with_id(low, 7)]).await;

        let first = h.engine.request_next(&worker("a"), at(10)).await.unwrap().unwrap();
        assert_eq!(first.id, low);
    }

    #[tokio::test]
    async fn repeated_polls_renew_without_moving_assigned_at() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;

        let first = h.engine.request_next(&worker("a"), at(10)).await.unwrap().unwrap();
        let second = h.engine.request_next(&worker("a"), at(100)).await.unwrap().unwrap();

        assert_eq!(first.id, ids[0]);
        assert_eq!(second.id, ids[0]);
        assert_eq!(first.lease, Some(Lease::new(worker("a"), at(10))));
        assert_eq!(second.lease, Some(Lease::new(worker("a"), at(10))));
    }

    #[tokio::test]
    async fn live_lease_blocks_other_workers() {
        let h = harness();
        seed(&h, vec![email(0)]).await;

        h.engine.request_next(&worker("a"), at(0)).await.unwrap().unwrap();
        assert_eq!(h.engine.request_next(&worker("b"), at(119)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed_at_exactly_ttl() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;

        h.engine.request_next(&worker("a"), at(0)).await.unwrap().unwrap();
        let taken = h.engine.request_next(&worker("b"), at(120)).await.unwrap().unwrap();

        assert_eq!(taken.id, ids[0]);
        assert_eq!(taken.lease, Some(Lease::new(worker("b"), at(120))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_admit_one_winner_per_task() {
        let h = Arc::new(harness());
        seed(&h, vec![email(0)]).await;

        let mut joins = Vec::new();
        for i in 0..16 {
            let h = Arc::clone(&h);
            joins.push(tokio::spawn(async move {
                h.engine
                    .request_next(&worker(&format!("w{i}")), at(1))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for join in joins {
            if join.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_never_share_a_task() {
        let h = Arc::new(harness());
        seed(&h, (0..8).map(email).collect()).await;

        let mut joins = Vec::new();
        for i in 0..8 {
            let h = Arc::clone(&h);
            joins.push(tokio::spawn(async move {
                h.engine
                    .request_next(&worker(&format!("w{i}")), at(100))
                    .await
                    .unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for join in joins {
            if let Some(task) = join.await.unwrap() {
                claimed.push(task.id);
            }
        }
        let unique: HashSet<_> = claimed.iter().copied().collect();
        assert_eq!(unique.len(), claimed.len());
        assert!(!claimed.is_empty());
    }

    #[tokio::test]
    async fn resolve_happens_exactly_once() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine.request_next(&worker("a"), at(1)).await.unwrap();

        let outcome = h
            .engine
            .resolve(ids[0], &worker("a"), TaskStatus::Positive, at(2))
            .await
            .unwrap();
        assert!(outcome.task().lease.is_none());

        let err = h
            .engine
            .resolve(ids[0], &worker("b"), TaskStatus::Negative, at(3))
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Conflict(id) if id == ids[0]));

        let stored = h.store.get(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Positive);
        assert_eq!(stored.resolution.unwrap().resolved_by, worker("a"));
    }

    #[tokio::test]
    async fn pending_verdict_is_a_release() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine.request_next(&worker("a"), at(1)).await.unwrap();

        let outcome = h
            .engine
            .resolve(ids[0], &worker("a"), TaskStatus::Pending, at(2))
            .await
            .unwrap();

        let task = match outcome {
            ResolveOutcome::Released(task) => task,
            other => panic!("expected release, got {other:?}"),
        };
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.lease.is_none());
        assert!(task.resolution.is_none());

        let again = h.engine.request_next(&worker("b"), at(3)).await.unwrap().unwrap();
        assert_eq!(again.id, ids[0]);
    }

    #[tokio::test]
    async fn pending_verdict_leaves_resolved_task_untouched() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine
            .resolve(ids[0], &worker("a"), TaskStatus::Neutral, at(1))
            .await
            .unwrap();
        let before = h.store.get(ids[0]).await.unwrap().unwrap();

        let outcome = h
            .engine
            .resolve(ids[0], &worker("b"), TaskStatus::Pending, at(2))
            .await
            .unwrap();

        assert!(matches!(outcome, ResolveOutcome::Released(_)));
        assert_eq!(outcome.task(), &before);
        assert_eq!(outcome.task().status, TaskStatus::Neutral);
        assert_eq!(
            outcome.task().resolution.as_ref().map(|r| r.resolved_by.as_str()),
            Some("a")
        );
        assert_eq!(h.store.get(ids[0]).await.unwrap(), Some(before));
        assert_eq!(h.engine.request_next(&worker("b"), at(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn release_twice_succeeds() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine.request_next(&worker("a"), at(1)).await.unwrap();

        let first = h.engine.release(ids[0], &worker("a")).await.unwrap();
        let second = h.engine.release(ids[0], &worker("a")).await.unwrap();

        assert!(first.lease.is_none());
        assert!(second.lease.is_none());
    }

    #[tokio::test]
    async fn release_by_non_owner_is_authoritative() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine.request_next(&worker("a"), at(1)).await.unwrap();

        h.engine.release(ids[0], &worker("b")).await.unwrap();

        let taken = h.engine.request_next(&worker("c"), at(2)).await.unwrap().unwrap();
        assert_eq!(taken.lease, Some(Lease::new(worker("c"), at(2))));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let h = harness();
        let id = TaskId::from_ulid(Ulid::new());

        let release = h.engine.release(id, &worker("a")).await.unwrap_err();
        let resolve = h
            .engine
            .resolve(id, &worker("a"), TaskStatus::Negative, at(0))
            .await
            .unwrap_err();

        assert!(matches!(release, TriageError::NotFound(_)));
        assert!(matches!(resolve, TriageError::NotFound(_)));
    }

    #[rstest]
    #[case::positive(TaskStatus::Positive, true)]
    #[case::neutral(TaskStatus::Neutral, true)]
    #[case::negative(TaskStatus::Negative, false)]
    #[tokio::test]
    async fn notification_follows_status(#[case] status: TaskStatus, #[case] expected: bool) {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;

        let outcome = h
            .engine
            .resolve(ids[0], &worker("a"), status, at(1))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ResolveOutcome::Resolved { notification_dispatched, .. } if notification_dispatched == expected
        ));

        let sent = h.notifier.wait_for(1, Duration::from_millis(200)).await;
        assert_eq!(sent.len(), usize::from(expected));
        if expected {
            assert_eq!(sent[0].subject, "received at 0");
        }
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_resolve() {
        let store = InMemoryTaskStore::new();
        let notifier = FailingNotifier::new();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(notifier.clone()), &NotificationConfig::default());
        let engine = ClaimEngine::new(Arc::new(store.clone()), LeasePolicy::default(), dispatcher);
        let task = engine.insert(email(0)).await.unwrap();

        let outcome = engine
            .resolve(task.id, &worker("a"), TaskStatus::Neutral, at(1))
            .await
            .unwrap();

        assert_eq!(outcome.task().status, TaskStatus::Neutral);
        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Neutral);
    }

    #[tokio::test]
    async fn reopen_returns_task_to_pool() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.engine
            .resolve(ids[0], &worker("a"), TaskStatus::Negative, at(1))
            .await
            .unwrap();
        assert_eq!(h.engine.request_next(&worker("b"), at(2)).await.unwrap(), None);

        let reopened = h.engine.reopen(ids[0]).await.unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.resolution.is_none());

        let again = h.engine.request_next(&worker("b"), at(3)).await.unwrap();
        assert_eq!(again.map(|t| t.id), Some(ids[0]));

        let err = h.engine.reopen(ids[0]).await.unwrap_err();
        assert!(matches!(err, TriageError::Conflict(_)));
    }

    #[tokio::test]
    async fn store_outage_is_surfaced() {
        let h = harness();
        let ids = seed(&h, vec![email(0)]).await;
        h.store.set_outage(Some("timeout".into())).await;

        let next = h.engine.request_next(&worker("a"), at(1)).await.unwrap_err();
        let resolve = h
            .engine
            .resolve(ids[0], &worker("a"), TaskStatus::Negative, at(1))
            .await
            .unwrap_err();

        assert!(matches!(next, TriageError::StoreUnavailable(msg) if msg == "timeout"));
        assert!(matches!(resolve, TriageError::StoreUnavailable(_)));
    }

    /// Lets a rival worker grab the oldest candidate between scan and claim.
    struct RacingStore {
        inner: InMemoryTaskStore,
        rival: WorkerId,
        claims: AtomicUsize,
        always_conflict: bool,
    }

    #[async_trait]
    impl TaskStore for RacingStore {
        async fn find_eligible(&self, probe: &ClaimProbe) -> Result<Vec<Task>, StoreError> {
            let snapshot = self.inner.find_eligible(probe).await?;
            if let Some(oldest) = snapshot.iter().min_by_key(|t| t.content.received_at) {
                let rival = ClaimProbe::new(self.rival.clone(), probe.now, probe.ttl);
                self.inner.try_claim(oldest.id, &rival, oldest.lease.as_ref()).await?;
            }
            Ok(snapshot)
        }

        async fn try_claim(
            &self,
            id: TaskId,
            probe: &ClaimProbe,
            observed: Option<&Lease>,
        ) -> Result<(Task, ClaimKind), StoreError> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            if self.always_conflict {
                return Err(StoreError::Conflict);
            }
            self.inner.try_claim(id, probe, observed).await
        }

        async fn try_resolve(
            &self,
            id: TaskId,
            status: TaskStatus,
            resolved_by: &WorkerId,
            now: Timestamp,
        ) -> Result<Task, StoreError> {
            self.inner.try_resolve(id, status, resolved_by, now).await
        }

        async fn try_release(&self, id: TaskId) -> Result<Task, StoreError> {
            self.inner.try_release(id).await
        }

        async fn try_reopen(&self, id: TaskId) -> Result<Task, StoreError> {
            self.inner.try_reopen(id).await
        }

        async fn insert(&self, task: Task) -> Result<(), StoreError> {
            self.inner.insert(task).await
        }

        async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
            self.inner.get(id).await
        }

        async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
            self.inner.list_all().await
        }
    }

    fn racing_engine(always_conflict: bool, policy: LeasePolicy) -> (Arc<RacingStore>, ClaimEngine) {
        let store = Arc::new(RacingStore {
            inner: InMemoryTaskStore::new(),
            rival: worker("rival"),
            claims: AtomicUsize::new(0),
            always_conflict,
        });
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingNotifier::new()),
            &NotificationConfig::default(),
        );
        let engine = ClaimEngine::new(store.clone(), policy, dispatcher);
        (store, engine)
    }

    #[tokio::test]
    async fn lost_race_falls_through_to_next_candidate() {
        let (store, engine) = racing_engine(false, LeasePolicy::default());
        let oldest = engine.insert(email(1)).await.unwrap();
        let next = engine.insert(email(2)).await.unwrap();

        let got = engine.request_next(&worker("a"), at(10)).await.unwrap().unwrap();

        assert_eq!(got.id, next.id);
        assert_eq!(store.claims.load(Ordering::SeqCst), 2);
        let stolen = store.inner.get(oldest.id).await.unwrap().unwrap();
        assert_eq!(stolen.lease.map(|l| l.owner), Some(worker("rival")));
    }

    #[tokio::test]
    async fn claim_attempts_are_bounded() {
        let policy = LeasePolicy {
            max_claim_attempts: 3,
            ..LeasePolicy::default()
        };
        let (store, engine) = racing_engine(true, policy);
        for i in 0..10 {
            engine.insert(email(i)).await.unwrap();
        }

        let got = engine.request_next(&worker("a"), at(100)).await.unwrap();

        assert_eq!(got, None);
        assert_eq!(store.claims.load(Ordering::SeqCst), 3);
    }
}
