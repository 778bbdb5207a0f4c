//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryLock**: 開発・テスト用の TTL 付きロック
//! - **PagedSource**: 開発・デモ用のページング source
//! - **RedisLock**: Redis 互換 store を使う本番用ロック（`redis` feature）

pub mod inmem_lock;
pub mod paged_source;
#[cfg(feature = "redis")]
pub mod redis_lock;

pub use self::inmem_lock::InMemoryLock;
pub use self::paged_source::PagedSource;
#[cfg(feature = "redis")]
pub use self::redis_lock::RedisLock;
