//! Notifier 実装
//!
//! - **LogNotifier**: 送信内容を tracing に出すだけ（開発用）
//! - **RecordingNotifier**: 送信内容をメモリに溜める（テスト・デモ用）
//! - **FailingNotifier**: 常に失敗する（失敗が resolve に波及しないことの確認用）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{Notification, Notifier, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            from = %notification.from,
            to = %notification.to,
            subject = %notification.subject,
            "notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Poll until at least `count` notifications arrived or `timeout` elapsed.
    /// Delivery happens on a spawned task, so callers cannot await it directly.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FailingNotifier {
    attempts: Arc<Mutex<usize>>,
}

impl FailingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attempts(&self) -> usize {
        *self.attempts.lock().await
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: Notification) -> Result<(), NotifyError> {
        *self.attempts.lock().await += 1;
        Err(NotifyError::Delivery("smtp relay refused".into()))
    }
}
