//! AuthGate port - bearer credential の検証
//!
//! エンジンが使うのは `Principal::worker` だけです。
//! グループ（admins）は管理系操作のゲートにのみ使います。

use async_trait::async_trait;

use crate::domain::{Principal, TriageError};

#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Resolve a credential, or fail with `TriageError::Unauthorized`.
    async fn authenticate(&self, credential: &str) -> Result<Principal, TriageError>;
}
