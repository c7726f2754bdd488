//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! ストア、認証、通知、時刻、ID 生成はすべてここの trait 越しに使います。

pub mod auth;
pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod task_store;

pub use self::auth::AuthGate;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{Notification, Notifier, NotifyError};
pub use self::task_store::{StoreError, TaskStore};
