//! App - アプリケーション層
//!
//! ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ClaimEngine**: lease ベースのタスク取得・解放・解決
//! - **Intake**: 新着メールの登録
//! - **NotificationDispatcher**: 解決後の通知（fire-and-forget）
//! - **TriageService**: 認証付きの表面（HTTP ルートが呼ぶ）
//! - **ReviewerGroup**: エンジンをポーリングするレビュアー群
//! - **AppBuilder**: 構築とワイヤリング

pub mod builder;
pub mod dispatcher;
pub mod engine;
pub mod intake;
pub mod reviewer_loop;
pub mod service;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::dispatcher::NotificationDispatcher;
pub use self::engine::{ClaimEngine, LeasePolicy, ResolveOutcome};
pub use self::intake::{Intake, IntakeRequest};
pub use self::reviewer_loop::{Reviewer, ReviewerGroup};
pub use self::service::TriageService;
