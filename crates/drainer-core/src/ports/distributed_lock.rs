//! DistributedLock port - TTL 付きのプロセス間排他
//!
//! key-value store の "set if absent + expire" をそのまま表現した最小の契約です。
//!
//! # 実装
//! - **InMemoryLock**: 開発・テスト用（同一プロセス内の複数 session を模擬）
//! - **RedisLock**: `redis` feature で有効（`SET key value NX EX ttl` / `DEL key`）

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;

/// Cross-process mutual exclusion with TTL-based auto-release.
///
/// # 設計原則
/// - `acquire` は 1 回だけ試す（待たない・リトライしない）
/// - 競合は `Ok(false)` で返す。`Err` はバックエンドの障害のみ
/// - TTL により、保持者がクラッシュしてもロックは永久には残らない
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Atomically set `key` to `value` if absent, expiring after `ttl`.
    /// Returns `true` when this call took the lock.
    async fn acquire(&self, key: &str, ttl: Duration, value: &str) -> Result<bool, LockError>;

    /// Remove `key`. Returns the number of keys removed (0 or 1).
    async fn release(&self, key: &str) -> Result<u64, LockError>;
}
