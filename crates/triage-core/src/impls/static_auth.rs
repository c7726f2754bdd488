//! StaticTokenAuth - 設定ファイルのトークン表による AuthGate
//!
//! 本番では identity provider（Cognito など）の検証に差し替える想定です。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::TokenEntry;
use crate::domain::{Principal, TriageError};
use crate::ports::AuthGate;

#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[TokenEntry]) -> Self {
        let mut auth = Self::new();
        for entry in entries {
            auth = auth.with_token(
                entry.token.clone(),
                Principal::new(entry.worker.clone(), entry.groups.clone()),
            );
        }
        auth
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl AuthGate for StaticTokenAuth {
    async fn authenticate(&self, credential: &str) -> Result<Principal, TriageError> {
        if credential.is_empty() {
            return Err(TriageError::Unauthorized("missing credential".into()));
        }
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| TriageError::Unauthorized("unknown or expired credential".into()))
    }
}
