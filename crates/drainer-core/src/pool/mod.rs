//! Pool module: admission permits, sizing, and the bounded worker pool.

mod config;
mod executor;
mod permit;

pub use config::{DEFAULT_KEEP_ALIVE, PoolConfig};
pub use executor::BoundedWorkerPool;
pub use permit::{Permit, PermitSet};
