//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: 開発用の正本
//! - **StaticTokenAuth**: トークン表による AuthGate
//! - **LogNotifier / RecordingNotifier / FailingNotifier**: Notifier
//!
//! 本番用の実装（DynamoDB などのストア、SES などの通知）は別クレートに置く想定です。

pub mod inmem_store;
pub mod notifiers;
pub mod static_auth;

pub use self::inmem_store::InMemoryTaskStore;
pub use self::notifiers::{FailingNotifier, LogNotifier, RecordingNotifier};
pub use self::static_auth::StaticTokenAuth;
