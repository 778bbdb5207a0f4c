//! Pool sizing.

use std::time::Duration;

use crate::error::ConfigError;

/// Idle timeout for workers started above the core count.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Sizing of a [`BoundedWorkerPool`](super::BoundedWorkerPool).
///
/// The pool's permit set is sized to `queue_capacity`, so at most that many
/// units are ever admitted at once and the queue can never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_threads: usize,
    pub max_threads: usize,
    pub queue_capacity: usize,
    pub keep_alive: Duration,
}

impl PoolConfig {
    /// Validated sizing: `queue_capacity >= max_threads >= core_threads >= 2`.
    ///
    /// Two core threads is the floor because a drain session keeps one
    /// worker busy with its poll loop; with a single core worker the
    /// sub-batches it queues would never be picked up.
    pub fn new(
        core_threads: usize,
        max_threads: usize,
        queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            core_threads,
            max_threads,
            queue_capacity,
            keep_alive: DEFAULT_KEEP_ALIVE,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_threads < 2 {
            return Err(ConfigError::TooFewCoreThreads(self.core_threads));
        }
        if self.max_threads < self.core_threads {
            return Err(ConfigError::MaxBelowCore {
                core_threads: self.core_threads,
                max_threads: self.max_threads,
            });
        }
        if self.queue_capacity < self.max_threads {
            return Err(ConfigError::QueueSmallerThanMaxThreads {
                queue_capacity: self.queue_capacity,
                max_threads: self.max_threads,
            });
        }
        Ok(())
    }
}
