//! DrainCoordinator - poll loop と fan-out
//!
//! 1 回の `drain` が 1 つの session です。poll loop 自身も pool 上の
//! 1 ユニットとして permit を 1 つ持ったまま動きます。
//!
//! # フロー
//! 1. AcquireLock: `SET NX` 相当で fetch lock を取る（取れなければ即終了、retry なし）
//! 2. Fetch: `TaskSource::fetch_batch`
//! 3. ReleaseLock: fetch の成否に関わらず lock を返す
//! 4. CheckEmpty: 空なら DrainingComplete
//! 5. Partition → FanOut: chunk ごとに permit を取り sub-batch worker を submit
//! 6. 1 に戻る
//!
//! 終了時（Completed / Aborted どちらでも）に pool を shutdown し、
//! poll permit を返します。実行中の sub-batch はそのまま走り切ります。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::sub_batch::execute_chunk;
use crate::config::DrainSettings;
use crate::domain::{
    AbortReason, DEFAULT_LOCK_KEY_PREFIX, LockKey, SessionId, SessionStats, Termination, partition,
};
use crate::error::DrainError;
use crate::pool::{BoundedWorkerPool, Permit};
use crate::ports::{DistributedLock, TaskSource};

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(120);

/// Entry point for draining a [`TaskSource`] through a [`BoundedWorkerPool`].
///
/// Holds only the lock backend and lock settings, so one coordinator can run
/// any number of sessions over different sources and pools.
pub struct DrainCoordinator {
    lock: Arc<dyn DistributedLock>,
    lock_ttl: Duration,
    key_prefix: String,
}

impl DrainCoordinator {
    pub fn new(lock: Arc<dyn DistributedLock>) -> Self {
        Self {
            lock,
            lock_ttl: DEFAULT_LOCK_TTL,
            key_prefix: DEFAULT_LOCK_KEY_PREFIX.to_string(),
        }
    }

    pub fn from_settings(lock: Arc<dyn DistributedLock>, settings: &DrainSettings) -> Self {
        Self::new(lock)
            .with_lock_ttl(settings.lock_ttl())
            .with_key_prefix(settings.lock_key_prefix.clone())
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn lock_key<S: TaskSource>(&self, source: &S) -> LockKey {
        LockKey::new(&self.key_prefix, source.identity())
    }

    /// Start a drain session and return without waiting for it.
    ///
    /// Waits for one permit for the poll loop itself; `cancel` interrupts
    /// that wait with [`DrainError::Cancelled`]. The same token is carried
    /// into the poll loop and stops its fan-out when fired.
    ///
    /// The pool is shut down when the session ends, so give each session
    /// its own pool.
    pub async fn drain<S: TaskSource>(
        &self,
        pool: &Arc<BoundedWorkerPool>,
        source: Arc<S>,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle, DrainError> {
        let session = SessionId::generate();
        let description = source.description();

        let poll_permit = pool.permits().acquire(cancel).await.inspect_err(|err| {
            tracing::error!(%session, source = %description, error = %err, "drain interrupted before the poll loop started");
        })?;

        let key = self.lock_key(source.as_ref());
        let poll = PollLoop {
            session,
            holder: format!("{session}@{}", Utc::now().to_rfc3339()),
            key,
            lock: Arc::clone(&self.lock),
            lock_ttl: self.lock_ttl,
            pool: Arc::clone(pool),
            source,
            cancel: cancel.clone(),
        };

        let (done_tx, done_rx) = oneshot::channel();
        // submit に失敗した場合 future ごと drop され、poll permit も返る
        pool.submit(async move {
            let termination = poll.run(poll_permit).await;
            let _ = done_tx.send(termination);
        })
        .inspect_err(|err| {
            tracing::error!(%session, source = %description, error = %err, "poll loop could not be scheduled");
        })?;

        tracing::info!(%session, source = %description, "drain session scheduled");
        Ok(SessionHandle {
            session,
            done: done_rx,
        })
    }
}

/// Handle to a running drain session.
///
/// Dropping it does not affect the session. It observes only the poll loop:
/// sub-batches may still be running after [`termination`](Self::termination)
/// resolves. Use the completion checks for that.
#[derive(Debug)]
pub struct SessionHandle {
    session: SessionId,
    done: oneshot::Receiver<Termination>,
}

impl SessionHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Wait for the poll loop to reach a terminal state.
    ///
    /// `None` if the loop was dropped without reporting, e.g. the runtime
    /// shut down underneath it.
    pub async fn termination(self) -> Option<Termination> {
        self.done.await.ok()
    }
}

enum PollState<T> {
    AcquireLock,
    Fetch,
    ReleaseLock(anyhow::Result<Vec<T>>),
    CheckEmpty(Vec<T>),
    Partition(Vec<T>),
    FanOut(Vec<Vec<T>>),
    Aborted(AbortReason),
    DrainingComplete,
}

struct PollLoop<S: TaskSource> {
    session: SessionId,
    holder: String,
    key: LockKey,
    lock: Arc<dyn DistributedLock>,
    lock_ttl: Duration,
    pool: Arc<BoundedWorkerPool>,
    source: Arc<S>,
    cancel: CancellationToken,
}

impl<S: TaskSource> PollLoop<S> {
    async fn run(self, poll_permit: Permit) -> Termination {
        tracing::info!(
            session = %self.session,
            source = %self.source.description(),
            key = %self.key,
            "poll loop started"
        );

        let mut stats = SessionStats::default();
        let mut state = PollState::AcquireLock;
        let termination = loop {
            state = match state {
                PollState::AcquireLock => self.acquire_lock().await,
                PollState::Fetch => PollState::ReleaseLock(self.fetch().await),
                PollState::ReleaseLock(fetched) => {
                    self.release_lock().await;
                    match fetched {
                        Ok(batch) => PollState::CheckEmpty(batch),
                        Err(err) => {
                            tracing::error!(
                                session = %self.session,
                                source = %self.source.description(),
                                error = %format!("{err:#}"),
                                "fetching next batch failed"
                            );
                            PollState::Aborted(AbortReason::SourceFetch(format!("{err:#}")))
                        }
                    }
                }
                PollState::CheckEmpty(batch) => {
                    tracing::info!(
                        session = %self.session,
                        items = batch.len(),
                        has_more = !batch.is_empty(),
                        "fetched next batch"
                    );
                    if batch.is_empty() {
                        PollState::DrainingComplete
                    } else {
                        stats.pages += 1;
                        PollState::Partition(batch)
                    }
                }
                PollState::Partition(batch) => {
                    let chunk_len = self.source.chunk_size();
                    if chunk_len == 0 {
                        tracing::warn!(session = %self.session, "chunk size 0 treated as 1");
                    }
                    PollState::FanOut(partition(batch, chunk_len))
                }
                PollState::FanOut(chunks) => self.fan_out(chunks, &mut stats).await,
                PollState::Aborted(reason) => break Termination::Aborted { reason, stats },
                PollState::DrainingComplete => break Termination::Completed(stats),
            };
        };

        self.pool.shutdown();
        poll_permit.release();

        match &termination {
            Termination::Completed(stats) => tracing::info!(
                session = %self.session,
                pages = stats.pages,
                chunks = stats.chunks,
                items = stats.items,
                "poll loop completed; source drained"
            ),
            Termination::Aborted { reason, stats } => tracing::warn!(
                session = %self.session,
                ?reason,
                pages = stats.pages,
                chunks = stats.chunks,
                "poll loop aborted"
            ),
        }
        termination
    }

    async fn acquire_lock(&self) -> PollState<S::Item> {
        match self
            .lock
            .acquire(self.key.as_str(), self.lock_ttl, &self.holder)
            .await
        {
            Ok(true) => PollState::Fetch,
            Ok(false) => {
                tracing::info!(
                    session = %self.session,
                    key = %self.key,
                    "fetch lock held by another process; ending session"
                );
                PollState::Aborted(AbortReason::LockUnavailable)
            }
            Err(err) => {
                tracing::error!(
                    session = %self.session,
                    key = %self.key,
                    error = %err,
                    "acquiring fetch lock failed"
                );
                PollState::Aborted(AbortReason::LockFailed(err.to_string()))
            }
        }
    }

    async fn fetch(&self) -> anyhow::Result<Vec<S::Item>> {
        match AssertUnwindSafe(self.source.fetch_batch()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("source panicked while fetching")),
        }
    }

    async fn release_lock(&self) {
        match self.lock.release(self.key.as_str()).await {
            Ok(0) => tracing::warn!(
                session = %self.session,
                key = %self.key,
                "fetch lock expired before release"
            ),
            Ok(_) => {}
            // TTL で自然に消えるのでここでは終了しない
            Err(err) => tracing::error!(
                session = %self.session,
                key = %self.key,
                error = %err,
                "releasing fetch lock failed; it stays until its TTL"
            ),
        }
    }

    async fn fan_out(
        &self,
        chunks: Vec<Vec<S::Item>>,
        stats: &mut SessionStats,
    ) -> PollState<S::Item> {
        for chunk in chunks {
            let Ok(permit) = self.pool.permits().acquire(&self.cancel).await else {
                tracing::warn!(
                    session = %self.session,
                    submitted = stats.chunks,
                    "fan-out cancelled; submitted chunks keep running"
                );
                return PollState::Aborted(AbortReason::Cancelled);
            };

            let len = chunk.len();
            tracing::debug!(session = %self.session, chunk_len = len, "submitting sub-batch");
            let source = Arc::clone(&self.source);
            let session = self.session;
            let submitted = self.pool.submit(async move {
                execute_chunk(source, chunk, permit, session).await;
            });
            if let Err(err) = submitted {
                tracing::error!(
                    session = %self.session,
                    error = %err,
                    "sub-batch refused by the pool"
                );
                return PollState::Aborted(AbortReason::Rejected);
            }

            stats.chunks += 1;
            stats.items += len;
        }
        PollState::AcquireLock
    }
}
