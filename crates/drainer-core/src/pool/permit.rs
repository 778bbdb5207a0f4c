//! Counting admission permits.
//!
//! Every unit of work handed to the pool holds one [`Permit`] for its whole
//! lifetime. The permit goes back to the set exactly once: either through
//! [`Permit::release`] or when the guard is dropped, which also covers a
//! unit that panics or is dropped by a rejecting pool.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::DrainError;

/// A fixed-capacity pool of admission tokens.
///
/// Cheap to clone; clones share the same tokens.
#[derive(Debug, Clone)]
pub struct PermitSet {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl PermitSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking snapshot of the free permits.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for one permit.
    ///
    /// Returns [`DrainError::Cancelled`] if `cancel` fires first (or has
    /// already fired); no permit is consumed in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, DrainError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DrainError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // The semaphore is never closed, so an error can only mean teardown.
                permit.map(Permit::new).map_err(|_| DrainError::Cancelled)
            }
        }
    }

    pub fn try_acquire(&self) -> Option<Permit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(Permit::new)
    }

    /// Take `n` permits at once if they are all free right now.
    ///
    /// Never queues, so it cannot hold back waiters in [`acquire`](Self::acquire).
    /// The returned guard holds all `n` permits. Dropping it gives them back;
    /// [`Permit::forget`] consumes them for good.
    pub fn try_acquire_many(&self, n: usize) -> Option<Permit> {
        let n = u32::try_from(n).ok()?;
        Arc::clone(&self.semaphore)
            .try_acquire_many_owned(n)
            .ok()
            .map(Permit::new)
    }
}

/// One or more permits taken from a [`PermitSet`].
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit {
    inner: OwnedSemaphorePermit,
}

impl Permit {
    fn new(inner: OwnedSemaphorePermit) -> Self {
        Self { inner }
    }

    /// Number of permits held by this guard.
    pub fn count(&self) -> usize {
        self.inner.num_permits()
    }

    /// Give the permits back to the set.
    pub fn release(self) {
        drop(self);
    }

    /// Consume the permits without returning them.
    /// The set's capacity shrinks permanently by [`count`](Self::count).
    pub fn forget(self) {
        self.inner.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_and_release_restore_the_count() {
        let permits = PermitSet::new(3);
        let cancel = CancellationToken::new();

        let p1 = permits.acquire(&cancel).await.unwrap();
        let p2 = permits.acquire(&cancel).await.unwrap();
        assert_eq!(permits.available(), 1);

        p1.release();
        drop(p2);
        assert_eq!(permits.available(), 3);
        assert_eq!(permits.capacity(), 3);
    }

    #[tokio::test]
    async fn cancelled_acquire_consumes_nothing() {
        let permits = PermitSet::new(1);
        let cancel = CancellationToken::new();
        let held = permits.acquire(&cancel).await.unwrap();

        let waiter = tokio::spawn({
            let permits = permits.clone();
            let cancel = cancel.clone();
            async move { permits.acquire(&cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(DrainError::Cancelled)));

        held.release();
        assert_eq!(permits.available(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_wins_over_free_permit() {
        let permits = PermitSet::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            permits.acquire(&cancel).await,
            Err(DrainError::Cancelled)
        ));
        assert_eq!(permits.available(), 1);
    }

    #[tokio::test]
    async fn acquire_waits_for_a_release() {
        let permits = PermitSet::new(1);
        let cancel = CancellationToken::new();
        let held = permits.acquire(&cancel).await.unwrap();

        let waiter = tokio::spawn({
            let permits = permits.clone();
            async move { permits.acquire(&CancellationToken::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        held.release();
        let permit = waiter.await.unwrap().unwrap();
        assert_eq!(permit.count(), 1);
    }

    #[test]
    fn try_acquire_many_returns_permits_on_drop() {
        let permits = PermitSet::new(4);

        let all = permits.try_acquire_many(4).unwrap();
        assert_eq!(all.count(), 4);
        assert_eq!(permits.available(), 0);

        drop(all);
        assert_eq!(permits.available(), 4);
    }

    #[test]
    fn try_acquire_many_fails_while_busy() {
        let permits = PermitSet::new(2);
        let _held = permits.try_acquire().unwrap();

        assert!(permits.try_acquire_many(2).is_none());
        assert_eq!(permits.available(), 1);
    }

    #[test]
    fn forget_shrinks_capacity_for_good() {
        let permits = PermitSet::new(2);

        permits.try_acquire_many(2).unwrap().forget();

        assert_eq!(permits.available(), 0);
        assert!(permits.try_acquire().is_none());
    }
}
