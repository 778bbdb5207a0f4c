//! RedisLock - 本番用の分散ロック（`redis` feature）
//!
//! `SET key value NX EX ttl` で取得し、`DEL key` で解放します。
//! Codis など Redis 互換の store でもそのまま使えます。

use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, aio::MultiplexedConnection};

use crate::error::LockError;
use crate::ports::DistributedLock;

/// Distributed lock backed by a Redis-compatible key-value store.
///
/// Holds one multiplexed connection; clones of it are cheap and are used
/// per call, so the lock can be shared across sessions behind an `Arc`.
#[derive(Clone)]
pub struct RedisLock {
    conn: MultiplexedConnection,
}

impl RedisLock {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(|e| LockError::Connect(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LockError::Connect(e.to_string()))?;
        tracing::info!("connected to redis lock backend");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

/// Redis `EX` takes whole seconds and rejects zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self, key: &str, ttl: Duration, value: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(reply.as_deref() == Some("OK"))
    }

    async fn release(&self, key: &str) -> Result<u64, LockError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))
    }
}
