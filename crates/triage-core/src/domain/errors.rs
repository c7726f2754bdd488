//! Errors - エラー型と分類
//!
//! `ErrorKind` は運用上の分類、`TriageError` は呼び出し元に返すエラーです。

use thiserror::Error;

use super::TaskId;

/// ErrorKind は TriageError の運用分類
///
/// - Contention: 楽観的並行制御で負けた（想定内）
/// - Caller: 呼び出し側の誤り（不正な ID、不正な入力）
/// - Auth: 認証・認可の失敗
/// - Infrastructure: ストアなどインフラの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Contention,
    Caller,
    Auth,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("task {0} is no longer actionable")]
    Conflict(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {0} already exists")]
    DuplicateId(TaskId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("task store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TriageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TriageError::Conflict(_) => ErrorKind::Contention,
            TriageError::NotFound(_)
            | TriageError::DuplicateId(_)
            | TriageError::InvalidRequest(_) => ErrorKind::Caller,
            TriageError::Unauthorized(_) => ErrorKind::Auth,
            TriageError::StoreUnavailable(_) => ErrorKind::Infrastructure,
        }
    }

    /// Response code the HTTP layer should answer with.
    ///
    /// A `Conflict` on resolve never gets here: `TriageService::resolve` turns it
    /// into an empty payload. Only admin `reopen` of a pending task answers 409.
    pub fn http_status(&self) -> u16 {
        match self {
            TriageError::Conflict(_) | TriageError::DuplicateId(_) => 409,
            TriageError::NotFound(_) => 404,
            TriageError::InvalidRequest(_) => 400,
            TriageError::Unauthorized(_) => 401,
            TriageError::StoreUnavailable(_) => 503,
        }
    }
}
