//! NotificationDispatcher - resolve 後の通知を切り離して送る
//!
//! 送信は spawn したタスクで行い、resolve の経路は結果を待ちません。
//! 失敗はログに残すだけで、リトライもロールバックもしません。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NotificationConfig;
use crate::domain::Task;
use crate::ports::{Notification, Notifier};

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    sender: String,
    recipient: String,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, config: &NotificationConfig) -> Self {
        Self {
            notifier,
            sender: config.sender.clone(),
            recipient: config.recipient.clone(),
        }
    }

    /// The message forwarded for a resolved email: its own subject and body.
    pub fn notification_for(&self, task: &Task) -> Notification {
        Notification {
            from: self.sender.clone(),
            to: self.recipient.clone(),
            subject: task.content.subject.clone(),
            body: task.content.body.clone(),
        }
    }

    /// Fire-and-forget. The handle is only useful to tests that want to join.
    pub fn dispatch(&self, task: &Task) -> JoinHandle<()> {
        let notification = self.notification_for(task);
        let notifier = Arc::clone(&self.notifier);
        let task_id = task.id;

        tokio::spawn(async move {
            match notifier.send(notification).await {
                Ok(()) => debug!(task_id = %task_id, "notification delivered"),
                Err(err) => warn!(task_id = %task_id, error = %err, "notification failed"),
            }
        })
    }
}
