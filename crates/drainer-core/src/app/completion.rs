//! Completion checks.
//!
//! A pool is finished when every permit is back in its set. Nothing here
//! joins worker tasks; permit accounting is the only signal.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::DrainError;
use crate::pool::BoundedWorkerPool;

/// How long [`is_finished`] waits for the full permit count.
pub const FINISH_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Default sleep between polls in [`wait_until_finished`].
pub const FINISH_POLL_INTERVAL: Duration = Duration::from_secs(2);

const FINISH_CHECK_STEP: Duration = Duration::from_millis(10);

/// What [`is_finished_with`] does with the permits once it holds all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionCheck {
    /// Give them straight back; the pool stays usable.
    #[default]
    Peek,
    /// Keep them. The pool admits nothing afterwards and later checks
    /// report `false`.
    Consume,
}

/// `true` iff all permits could be taken within [`FINISH_CHECK_TIMEOUT`].
/// The permits are returned immediately.
pub async fn is_finished(pool: &BoundedWorkerPool) -> bool {
    is_finished_with(pool, CompletionCheck::Peek).await
}

/// Watch the free count for up to [`FINISH_CHECK_TIMEOUT`] and reserve every
/// permit once they are all free.
///
/// The check never waits in the semaphore queue. Permits released while it
/// runs go to the fan-out first, so calling it mid-drain does not stall
/// admission.
pub async fn is_finished_with(pool: &BoundedWorkerPool, check: CompletionCheck) -> bool {
    let permits = pool.permits();
    let deadline = Instant::now() + FINISH_CHECK_TIMEOUT;

    let all = loop {
        if permits.available() == permits.capacity() {
            if let Some(all) = permits.try_acquire_many(permits.capacity()) {
                break all;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(FINISH_CHECK_STEP).await;
    };

    match check {
        CompletionCheck::Peek => all.release(),
        CompletionCheck::Consume => {
            tracing::warn!(
                capacity = permits.capacity(),
                "completion check consumed every permit; pool admits no more work"
            );
            all.forget();
        }
    }
    true
}

/// Block until every permit is free, polling every [`FINISH_POLL_INTERVAL`].
pub async fn wait_until_finished(
    pool: &BoundedWorkerPool,
    cancel: &CancellationToken,
) -> Result<(), DrainError> {
    wait_until_finished_every(pool, FINISH_POLL_INTERVAL, cancel).await
}

/// Like [`wait_until_finished`] with a caller-chosen poll interval.
///
/// Reads the free count without taking permits, so it never consumes them.
/// Returns [`DrainError::Cancelled`] if `cancel` fires while waiting.
pub async fn wait_until_finished_every(
    pool: &BoundedWorkerPool,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), DrainError> {
    let permits = pool.permits();
    while permits.available() < permits.capacity() {
        tracing::debug!(
            in_flight = permits.capacity() - permits.available(),
            "waiting for pool to finish"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DrainError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
    Ok(())
}
