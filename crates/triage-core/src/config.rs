//! TOML configuration.
//!
//! Every section is optional; `TriageConfig::load(None)` yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::Deserialize;
use thiserror::Error;

use crate::app::engine::LeasePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TriageConfig {
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeaseConfig {
    /// Seconds after which an unrenewed lease may be reclaimed.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound on claim attempts per `request_next` call.
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: usize,
}

fn default_ttl_secs() -> u64 {
    120
}

fn default_max_claim_attempts() -> usize {
    5
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_claim_attempts: default_max_claim_attempts(),
        }
    }
}

impl LeaseConfig {
    pub fn policy(&self) -> Result<LeasePolicy, ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid("lease.ttl_secs must be > 0".into()));
        }
        if self.max_claim_attempts == 0 {
            return Err(ConfigError::Invalid(
                "lease.max_claim_attempts must be > 0".into(),
            ));
        }
        let ttl = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ConfigError::Invalid("lease.ttl_secs is out of range".into()))?;
        Ok(LeasePolicy {
            ttl,
            max_claim_attempts: self.max_claim_attempts,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_recipient")]
    pub recipient: String,
}

fn default_sender() -> String {
    "triage@example.com".to_string()
}

fn default_recipient() -> String {
    "sales@example.com".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            recipient: default_recipient(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenEntry {
    pub token: String,
    pub worker: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl TriageConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&data)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(data)?;
        cfg.lease.policy()?;
        Ok(cfg)
    }
}
