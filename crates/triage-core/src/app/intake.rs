//! Intake - 新着メールを Pending タスクとして登録
//!
//! 入力チェックは「項目が揃っているか」だけです。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::ClaimEngine;
use crate::domain::{EmailContent, Task, Timestamp, TriageError};
use crate::ports::IdGenerator;

/// Payload posted by the mail intake hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeRequest {
    #[serde(rename = "Email_lead", default)]
    pub address: Option<String>,

    #[serde(rename = "Subject", default)]
    pub subject: Option<String>,

    #[serde(rename = "Body", default)]
    pub body: Option<String>,

    /// RFC 3339 or RFC 2822 (as found in mail headers).
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
}

impl IntakeRequest {
    pub fn into_content(self) -> Result<EmailContent, TriageError> {
        let address = required(self.address, "Email_lead")?;
        let subject = required(self.subject, "Subject")?;
        let body = required(self.body, "Body")?;
        let date = required(self.date, "Date")?;
        Ok(EmailContent {
            address,
            subject,
            body,
            received_at: parse_date(&date)?,
        })
    }
}

fn required(field: Option<String>, name: &str) -> Result<String, TriageError> {
    field.ok_or_else(|| TriageError::InvalidRequest(format!("missing field `{name}`")))
}

fn parse_date(raw: &str) -> Result<Timestamp, TriageError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TriageError::InvalidRequest(format!("unparseable `Date`: {raw}")))
}

pub struct Intake {
    engine: Arc<ClaimEngine>,
    ids: Arc<dyn IdGenerator>,
}

impl Intake {
    pub fn new(engine: Arc<ClaimEngine>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { engine, ids }
    }

    pub async fn submit(&self, request: IntakeRequest) -> Result<Task, TriageError> {
        let content = request.into_content()?;
        let task = Task::new(self.ids.generate_task_id(), content);
        let task = self.engine.insert(task).await?;
        info!(task_id = %task.id, address = %task.content.address, "email received");
        Ok(task)
    }
}
