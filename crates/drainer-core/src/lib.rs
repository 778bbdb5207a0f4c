//! drainer-core
//!
//! Bounded, lock-coordinated draining of paginated work sources.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, chunk partition, lock key, session の終了状態）
//! - **ports**: 抽象化レイヤー（TaskSource, DistributedLock）
//! - **pool**: permit 付きの bounded worker pool
//! - **app**: DrainCoordinator（poll loop / fan-out）と完了判定
//! - **impls**: 実装（InMemoryLock, PagedSource, `redis` feature で RedisLock）
//! - **config**: 環境変数からの DrainSettings
//! - **error**: ConfigError / DrainError / LockError
//! - **observability**: PoolStatus

pub mod domain;
pub mod ports;
pub mod pool;
pub mod app;
pub mod impls;
pub mod config;
pub mod error;
pub mod observability;

pub use app::{
    CompletionCheck, DrainCoordinator, SessionHandle, is_finished, is_finished_with,
    wait_until_finished, wait_until_finished_every,
};
pub use config::DrainSettings;
pub use error::{ConfigError, DrainError, LockError};
pub use pool::{BoundedWorkerPool, PoolConfig};
