//! triage-core
//!
//! Lease-based claim engine for routing inbound emails to human reviewers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, worker, task, state, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, AuthGate, Notifier, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（engine, intake, dispatcher, service, reviewer_loop, builder）
//! - **impls**: 実装（InMemoryTaskStore, StaticTokenAuth, Notifier 各種）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
