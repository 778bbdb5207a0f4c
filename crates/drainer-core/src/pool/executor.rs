//! Bounded worker pool.
//!
//! Workers are Tokio tasks pulling boxed units from a bounded channel.
//! Admission follows the classic core/max/queue rule:
//! 1. fewer than `core_threads` workers alive: start a core worker for the unit
//! 2. otherwise enqueue it
//! 3. queue full: start an extra worker (up to `max_threads`) for the unit
//! 4. otherwise reject
//!
//! Extra workers exit after `keep_alive` without work. Core workers exit once
//! the pool is shut down and the queue has drained.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::config::PoolConfig;
use super::permit::PermitSet;
use crate::error::{ConfigError, DrainError};
use crate::observability::PoolStatus;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerKind {
    Core,
    Extra,
}

struct Shared {
    /// `None` once the pool is shut down; dropping the sender closes the queue.
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Job>>,
    live_workers: AtomicUsize,
    keep_alive: Duration,
}

impl Shared {
    async fn run_worker(self: Arc<Self>, first: Job, kind: WorkerKind) {
        let mut next = Some(first);
        while let Some(job) = next.take() {
            run_job(job).await;
            next = self.next_job(kind).await;
        }
        let remaining = self.live_workers.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::debug!(?kind, remaining, "worker exited");
    }

    async fn next_job(&self, kind: WorkerKind) -> Option<Job> {
        let recv = async { self.receiver.lock().await.recv().await };
        match kind {
            WorkerKind::Core => recv.await,
            WorkerKind::Extra => tokio::time::timeout(self.keep_alive, recv)
                .await
                .ok()
                .flatten(),
        }
    }
}

async fn run_job(job: Job) {
    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
        tracing::error!("unit of work panicked; worker keeps running");
    }
}

/// Fixed-size worker pool paired with a [`PermitSet`] of `queue_capacity` permits.
///
/// Create one per drain session. Must be used from within a Tokio runtime.
pub struct BoundedWorkerPool {
    config: PoolConfig,
    permits: PermitSet,
    shared: Arc<Shared>,
}

impl BoundedWorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        tracing::info!(
            core_threads = config.core_threads,
            max_threads = config.max_threads,
            queue_capacity = config.queue_capacity,
            "worker pool created"
        );
        Ok(Self {
            permits: PermitSet::new(config.queue_capacity),
            shared: Arc::new(Shared {
                sender: Mutex::new(Some(sender)),
                receiver: tokio::sync::Mutex::new(receiver),
                live_workers: AtomicUsize::new(0),
                keep_alive: config.keep_alive,
            }),
            config,
        })
    }

    /// Shorthand for `new(PoolConfig::new(..)?)` with the default keep-alive.
    pub fn fixed(
        core_threads: usize,
        max_threads: usize,
        queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(PoolConfig::new(core_threads, max_threads, queue_capacity)?)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn permits(&self) -> &PermitSet {
        &self.permits
    }

    pub fn capacity(&self) -> usize {
        self.permits.capacity()
    }

    /// Hand a unit of work to the pool without waiting for it.
    ///
    /// Callers are expected to hold a permit for the unit; with that
    /// discipline the queue never overflows and [`DrainError::Rejected`]
    /// signals an accounting bug.
    pub fn submit<F>(&self, unit: F) -> Result<(), DrainError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(DrainError::PoolShutdown);
        };

        let job: Job = Box::pin(unit);
        if self.reserve_worker(self.config.core_threads) {
            self.spawn_worker(job, WorkerKind::Core);
            return Ok(());
        }

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                if self.reserve_worker(self.config.max_threads) {
                    self.spawn_worker(job, WorkerKind::Extra);
                    Ok(())
                } else {
                    tracing::error!(
                        queue_capacity = self.config.queue_capacity,
                        max_threads = self.config.max_threads,
                        "worker pool queue full; rejecting unit of work"
                    );
                    Err(DrainError::Rejected)
                }
            }
            Err(TrySendError::Closed(_)) => Err(DrainError::PoolShutdown),
        }
    }

    /// Stop accepting submissions. Queued and running units still execute;
    /// this does not wait for them.
    pub fn shutdown(&self) {
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            tracing::info!(
                live_workers = self.live_workers(),
                "worker pool shut down; in-flight work continues"
            );
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.permits.available();
        PoolStatus {
            capacity: self.capacity(),
            available_permits: available,
            in_flight: self.capacity().saturating_sub(available),
            live_workers: self.live_workers(),
            accepting: !self.is_shutdown(),
        }
    }

    fn reserve_worker(&self, limit: usize) -> bool {
        self.shared
            .live_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < limit).then_some(live + 1)
            })
            .is_ok()
    }

    fn spawn_worker(&self, first: Job, kind: WorkerKind) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(shared.run_worker(first, kind));
    }
}

impl Drop for BoundedWorkerPool {
    fn drop(&mut self) {
        // Workers hold `shared`; closing the queue lets core workers exit.
        self.shutdown();
    }
}

impl std::fmt::Debug for BoundedWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWorkerPool")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn submitted_unit_runs() {
        let pool = BoundedWorkerPool::fixed(2, 2, 4).unwrap();
        let (tx, rx) = oneshot::channel();

        pool.submit(async move {
            tx.send(42).unwrap();
        })
        .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
        assert_eq!(pool.live_workers(), 1);
    }

    #[tokio::test]
    async fn construction_rejects_small_queue() {
        let err = BoundedWorkerPool::fixed(2, 4, 3).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::QueueSmallerThanMaxThreads { .. }
        ));
    }

    #[tokio::test]
    async fn construction_rejects_single_core_thread() {
        let config = PoolConfig {
            core_threads: 1,
            max_threads: 2,
            queue_capacity: 2,
            keep_alive: Duration::from_secs(60),
        };
        assert!(matches!(
            BoundedWorkerPool::new(config),
            Err(ConfigError::TooFewCoreThreads(1))
        ));
    }

    #[tokio::test]
    async fn workers_never_exceed_max_threads_and_overflow_is_rejected() {
        let pool = BoundedWorkerPool::fixed(2, 3, 3).unwrap();
        let gate = CancellationToken::new();

        // two core workers + three queued + one extra worker
        for _ in 0..6 {
            let gate = gate.clone();
            pool.submit(async move { gate.cancelled().await }).unwrap();
        }
        assert_eq!(pool.live_workers(), 3);

        let rejected = pool.submit(async {});
        assert!(matches!(rejected, Err(DrainError::Rejected)));

        gate.cancel();
    }

    #[tokio::test]
    async fn shutdown_refuses_new_work_but_runs_queued_units() {
        let pool = BoundedWorkerPool::fixed(2, 2, 4).unwrap();
        let gate = CancellationToken::new();
        let (tx, rx) = oneshot::channel();

        // Occupy both core workers so the next unit stays queued.
        for _ in 0..2 {
            let gate = gate.clone();
            pool.submit(async move { gate.cancelled().await }).unwrap();
        }
        pool.submit(async move {
            tx.send(()).unwrap();
        })
        .unwrap();

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(matches!(
            pool.submit(async {}),
            Err(DrainError::PoolShutdown)
        ));

        gate.cancel();
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn panicking_unit_does_not_kill_the_worker() {
        let pool = BoundedWorkerPool::fixed(2, 2, 2).unwrap();
        let gate = CancellationToken::new();
        let ran = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        pool.submit(async { panic!("boom") }).unwrap();
        pool.submit({
            let gate = gate.clone();
            async move { gate.cancelled().await }
        })
        .unwrap();
        // both core workers exist; only the one that saw the panic is free
        pool.submit({
            let ran = Arc::clone(&ran);
            async move {
                ran.store(true, Ordering::SeqCst);
                tx.send(()).unwrap();
            }
        })
        .unwrap();

        rx.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(pool.live_workers(), 2);
        gate.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn extra_workers_retire_after_keep_alive() {
        let config = PoolConfig::new(2, 3, 3)
            .unwrap()
            .with_keep_alive(Duration::from_secs(5));
        let pool = BoundedWorkerPool::new(config).unwrap();
        let gate = CancellationToken::new();

        for _ in 0..6 {
            let gate = gate.clone();
            pool.submit(async move { gate.cancelled().await }).unwrap();
        }
        assert_eq!(pool.live_workers(), 3);

        gate.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(pool.live_workers(), 2);
    }

    #[tokio::test]
    async fn status_reports_permits_and_acceptance() {
        let pool = BoundedWorkerPool::fixed(2, 2, 3).unwrap();
        let _permit = pool.permits().try_acquire().unwrap();

        let status = pool.status();
        assert_eq!(status.capacity, 3);
        assert_eq!(status.available_permits, 2);
        assert_eq!(status.in_flight, 1);
        assert!(status.accepting);

        pool.shutdown();
        assert!(!pool.status().accepting);
    }
}
