//! InMemoryLock - 開発・テスト用の TTL 付きロック
//!
//! # 学習ポイント
//! - `Mutex<HashMap<..>>` による set-if-absent の原子性
//! - `tokio::time::Instant` を使うことで、テストで時間を進められる

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::LockError;
use crate::ports::DistributedLock;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local stand-in for the key-value store used as a lock service.
///
/// Several drain sessions sharing one `InMemoryLock` (behind an `Arc`) behave
/// like several processes sharing one store.
#[derive(Default)]
pub struct InMemoryLock {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder value of `key`, if the lock is held and not expired.
    pub fn holder(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(&self, key: &str, ttl: Duration, value: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<u64, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.remove(key) {
            Some(entry) if entry.is_live(now) => Ok(1),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn second_acquire_fails_until_release() {
        let lock = InMemoryLock::new();

        assert!(lock.acquire("k", TTL, "a").await.unwrap());
        assert!(!lock.acquire("k", TTL, "b").await.unwrap());
        assert_eq!(lock.holder("k").as_deref(), Some("a"));

        assert_eq!(lock.release("k").await.unwrap(), 1);
        assert_eq!(lock.release("k").await.unwrap(), 0);
        assert!(lock.acquire("k", TTL, "b").await.unwrap());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let lock = InMemoryLock::new();

        assert!(lock.acquire("orders", TTL, "a").await.unwrap());
        assert!(lock.acquire("invoices", TTL, "a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lock_expires_after_ttl() {
        let lock = InMemoryLock::new();
        assert!(lock.acquire("k", Duration::from_secs(2), "a").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!lock.acquire("k", TTL, "b").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(lock.holder("k"), None);
        assert!(lock.acquire("k", TTL, "b").await.unwrap());
        assert_eq!(lock.holder("k").as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn releasing_an_expired_lock_removes_nothing() {
        let lock = InMemoryLock::new();
        assert!(lock.acquire("k", Duration::from_secs(1), "a").await.unwrap());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(lock.release("k").await.unwrap(), 0);
    }
}
