use thiserror::Error;

/// Invalid pool sizing or an unparsable setting.
///
/// Always surfaced at construction time, before any work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("queue capacity ({queue_capacity}) must be at least max threads ({max_threads})")]
    QueueSmallerThanMaxThreads {
        queue_capacity: usize,
        max_threads: usize,
    },

    #[error("single-threaded pools are not supported (core threads = {0}, need at least 2)")]
    TooFewCoreThreads(usize),

    #[error("max threads ({max_threads}) must be at least core threads ({core_threads})")]
    MaxBelowCore {
        core_threads: usize,
        max_threads: usize,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Errors surfaced by the permit set, the pool and the drain entry point.
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("permit acquisition cancelled")]
    Cancelled,

    /// The bounded queue was full and no extra worker could be started.
    /// Under correct permit discipline this indicates a capacity-accounting bug.
    #[error("worker pool rejected the unit of work (queue full)")]
    Rejected,

    #[error("worker pool is shut down")]
    PoolShutdown,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by a [`DistributedLock`](crate::ports::DistributedLock) backend.
///
/// Contention is not an error: `acquire` returns `Ok(false)` for that.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("lock backend connection failed: {0}")]
    Connect(String),

    #[error("lock backend error: {0}")]
    Backend(String),
}
