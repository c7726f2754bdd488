//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - store / notifier は必須。足りなければ build() が BuildError を返す
//! - lease 設定が不正（ttl = 0 など）なら build() で落とす
//! - clock / id generator / auth は省略時にデフォルトを使う

use std::sync::Arc;

use super::dispatcher::NotificationDispatcher;
use super::engine::ClaimEngine;
use super::intake::Intake;
use super::service::TriageService;
use crate::config::{ConfigError, TriageConfig};
use crate::impls::StaticTokenAuth;
use crate::ports::{AuthGate, Clock, IdGenerator, Notifier, SystemClock, TaskStore, UlidGenerator};

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}. Call the matching AppBuilder setter before build().")]
    Missing(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .store(Arc::new(InMemoryTaskStore::new()))
///     .notifier(Arc::new(LogNotifier))
///     .build()?;
/// ```
pub struct AppBuilder {
    config: TriageConfig,
    store: Option<Arc<dyn TaskStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    auth: Option<Arc<dyn AuthGate>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl AppBuilder {
    pub fn new(config: TriageConfig) -> Self {
        Self {
            config,
            store: None,
            notifier: None,
            auth: None,
            clock: None,
            ids: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Defaults to the token table in `[auth]`.
    pub fn auth(mut self, auth: Arc<dyn AuthGate>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Defaults to `SystemClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a `UlidGenerator` driven by the app clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let policy = self.config.lease.policy()?;
        let store = self.store.ok_or(BuildError::Missing("store"))?;
        let notifier = self.notifier.ok_or(BuildError::Missing("notifier"))?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let auth: Arc<dyn AuthGate> = match self.auth {
            Some(auth) => auth,
            None => Arc::new(StaticTokenAuth::from_entries(&self.config.auth.tokens)),
        };

        let dispatcher = NotificationDispatcher::new(notifier, &self.config.notification);
        let engine = Arc::new(ClaimEngine::new(store, policy, dispatcher));
        let intake = Intake::new(Arc::clone(&engine), ids);
        let service = TriageService::new(Arc::clone(&engine), intake, auth, Arc::clone(&clock));

        Ok(App {
            config: self.config,
            engine,
            service,
            clock,
        })
    }
}

/// App は構築済みのアプリケーション
pub struct App {
    pub config: TriageConfig,
    pub engine: Arc<ClaimEngine>,
    pub service: TriageService,
    pub clock: Arc<dyn Clock>,
}
