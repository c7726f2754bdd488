//! triage デモ: 受信箱を投入して、レビュアー群に捌かせる
//!
//! usage: triage-cli [-c config.toml] [inbox.json]
//!
//! `-c` がなければ `TRIAGE_CONFIG` を見ます。
//!
//! inbox.json はインテークフックと同じ形（`Email_lead`, `Subject`, `Body`, `Date`）の配列です。

mod trace;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::time::sleep;
use tracing::{info, warn};

use triage_core::app::{AppBuilder, IntakeRequest, Reviewer, ReviewerGroup};
use triage_core::config::{TokenEntry, TriageConfig};
use triage_core::domain::{ADMIN_GROUP, Task, TaskStatus, WorkerId};
use triage_core::impls::{InMemoryTaskStore, LogNotifier};

const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(version, about)]
/// Feed an inbox to a group of reviewers and print where every email ended up
struct Args {
    /// path to a TOML config file
    #[arg(short = 'c', long = "config", env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON array of intake payloads; a built-in sample inbox when omitted
    inbox: Option<PathBuf>,
}

/// Keyword rules standing in for a human reading the email.
struct KeywordReviewer;

#[async_trait]
impl Reviewer for KeywordReviewer {
    async fn review(&self, reviewer: &WorkerId, task: &Task) -> Option<TaskStatus> {
        // 人間が読む時間の代わり
        sleep(Duration::from_millis(50)).await;

        let body = task.content.body.to_lowercase();
        let verdict = if body.contains("unsubscribe") || body.contains("not interested") {
            Some(TaskStatus::Negative)
        } else if body.contains("call me") || body.contains("interested") {
            Some(TaskStatus::Positive)
        } else if body.contains("maybe") || body.contains("later") {
            Some(TaskStatus::Neutral)
        } else {
            // 判断できないものは手放す
            None
        };
        info!(worker = %reviewer, task_id = %task.id, verdict = ?verdict, "reviewed");
        verdict
    }
}

fn demo_tokens() -> Vec<TokenEntry> {
    [("t-alice", "alice", true), ("t-bob", "bob", false), ("t-carol", "carol", false)]
        .into_iter()
        .map(|(token, worker, admin)| TokenEntry {
            token: token.to_string(),
            worker: worker.to_string(),
            groups: if admin { vec![ADMIN_GROUP.to_string()] } else { vec![] },
        })
        .collect()
}

fn demo_inbox() -> anyhow::Result<Vec<IntakeRequest>> {
    let inbox = serde_json::json!([
        { "Email_lead": "ana@example.com", "Subject": "Re: pricing", "Body": "Interested, call me tomorrow", "Date": "2024-03-01T09:05:00Z" },
        { "Email_lead": "ben@example.com", "Subject": "Re: intro", "Body": "Maybe next quarter", "Date": "2024-03-01T08:10:00Z" },
        { "Email_lead": "cy@example.com", "Subject": "Re: follow-up", "Body": "Please unsubscribe me", "Date": "2024-03-01T08:55:00Z" },
        { "Email_lead": "dee@example.com", "Subject": "Re: demo", "Body": "We are interested in a demo", "Date": "2024-03-01T07:45:00Z" },
        { "Email_lead": "eli@example.com", "Subject": "Re: offer", "Body": "Not interested, thanks", "Date": "2024-03-01T10:20:00Z" },
        { "Email_lead": "fay@example.com", "Subject": "Re: check-in", "Body": "Ping me later this year", "Date": "2024-03-01T09:40:00Z" },
    ]);
    Ok(serde_json::from_value(inbox)?)
}

fn load_inbox(path: Option<&Path>) -> anyhow::Result<Vec<IntakeRequest>> {
    match path {
        Some(p) => {
            let data = std::fs::read_to_string(p)
                .with_context(|| format!("reading inbox {}", p.display()))?;
            Ok(serde_json::from_str(&data)?)
        }
        None => demo_inbox(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // (A) 設定とログ
    let mut config = TriageConfig::load(args.config.as_deref())?;
    trace::init(config.log.format);
    if config.auth.tokens.is_empty() {
        config.auth.tokens = demo_tokens();
    }
    let reviewers: Vec<WorkerId> = config
        .auth
        .tokens
        .iter()
        .map(|t| WorkerId::new(t.worker.clone()))
        .collect();
    let admin_token = config
        .auth
        .tokens
        .iter()
        .find(|t| t.groups.iter().any(|g| g == ADMIN_GROUP))
        .map(|t| t.token.clone());

    // (B) ワイヤリング
    let store = InMemoryTaskStore::new();
    let app = AppBuilder::new(config)
        .store(Arc::new(store.clone()))
        .notifier(Arc::new(LogNotifier))
        .build()?;

    // (C) 受信箱の投入
    for request in load_inbox(args.inbox.as_deref())? {
        match app.service.create(request).await {
            Ok(task) => info!(task_id = %task.id, subject = %task.content.subject, "queued"),
            Err(err) => warn!(error = %err, kind = ?err.kind(), status = err.http_status(), "rejected intake"),
        }
    }
    if store.is_empty().await {
        warn!("nothing was queued");
        return Ok(());
    }

    // (D) レビュアー起動
    let group = ReviewerGroup::spawn(
        reviewers,
        Arc::clone(&app.engine),
        Arc::clone(&app.clock),
        Arc::new(KeywordReviewer),
        Duration::from_millis(100),
    );

    // (E) 全件が終端になるまで待つ（判定できないメールが残ると回り続けるので上限あり）
    let drained = async {
        loop {
            sleep(Duration::from_millis(200)).await;
            match app.engine.list_all().await {
                Ok(tasks) if tasks.iter().all(|t| t.status.is_terminal()) => break,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "listing failed"),
            }
        }
    };
    tokio::select! {
        _ = drained => info!("inbox drained"),
        _ = sleep(DRAIN_DEADLINE) => warn!("gave up waiting; undecided emails remain pending"),
    }
    group.shutdown_and_join().await;

    // (F) 結果表示
    let tasks = match admin_token {
        Some(token) => app.service.all_tasks(&token).await?,
        None => app.engine.list_all().await?,
    };
    for status in TaskStatus::ALL {
        let count = tasks.iter().filter(|t| t.status == status).count();
        info!(%status, count, "summary");
    }
    println!("{}", serde_json::to_string_pretty(&tasks)?);
    Ok(())
}
