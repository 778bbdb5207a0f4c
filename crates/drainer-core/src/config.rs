//! Settings for a drain deployment.
//!
//! Values come from environment variables (the CLI loads a properties-style
//! env file into the environment first). Missing variables fall back to the
//! defaults below; present but unparsable ones are a [`ConfigError`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_LOCK_KEY_PREFIX;
use crate::error::ConfigError;
use crate::pool::PoolConfig;

pub const ENV_CORE_THREADS: &str = "DRAIN_CORE_THREADS";
pub const ENV_MAX_THREADS: &str = "DRAIN_MAX_THREADS";
pub const ENV_QUEUE_CAPACITY: &str = "DRAIN_QUEUE_CAPACITY";
pub const ENV_KEEP_ALIVE_SECS: &str = "DRAIN_KEEP_ALIVE_SECS";
pub const ENV_LOCK_TTL_SECS: &str = "DRAIN_LOCK_TTL_SECS";
pub const ENV_LOCK_KEY_PREFIX: &str = "DRAIN_LOCK_KEY_PREFIX";
pub const ENV_FINISH_POLL_MS: &str = "DRAIN_FINISH_POLL_MS";
pub const ENV_REDIS_URL: &str = "REDIS_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainSettings {
    pub core_threads: usize,
    pub max_threads: usize,
    pub queue_capacity: usize,
    pub keep_alive_secs: u64,
    pub lock_ttl_secs: u64,
    pub lock_key_prefix: String,
    pub finish_poll_interval_ms: u64,
    /// Redis-compatible lock backend. `None` means the in-memory lock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            core_threads: 2,
            max_threads: 4,
            queue_capacity: 16,
            keep_alive_secs: 60,
            lock_ttl_secs: 120,
            lock_key_prefix: DEFAULT_LOCK_KEY_PREFIX.to_string(),
            finish_poll_interval_ms: 2_000,
            redis_url: None,
        }
    }
}

impl DrainSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            core_threads: parse_or(&lookup, ENV_CORE_THREADS, defaults.core_threads)?,
            max_threads: parse_or(&lookup, ENV_MAX_THREADS, defaults.max_threads)?,
            queue_capacity: parse_or(&lookup, ENV_QUEUE_CAPACITY, defaults.queue_capacity)?,
            keep_alive_secs: parse_or(&lookup, ENV_KEEP_ALIVE_SECS, defaults.keep_alive_secs)?,
            lock_ttl_secs: parse_or(&lookup, ENV_LOCK_TTL_SECS, defaults.lock_ttl_secs)?,
            lock_key_prefix: lookup(ENV_LOCK_KEY_PREFIX).unwrap_or(defaults.lock_key_prefix),
            finish_poll_interval_ms: parse_or(
                &lookup,
                ENV_FINISH_POLL_MS,
                defaults.finish_poll_interval_ms,
            )?,
            redis_url: lookup(ENV_REDIS_URL).filter(|url| !url.trim().is_empty()),
        })
    }

    /// Validated pool sizing.
    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        Ok(
            PoolConfig::new(self.core_threads, self.max_threads, self.queue_capacity)?
                .with_keep_alive(Duration::from_secs(self.keep_alive_secs)),
        )
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn finish_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finish_poll_interval_ms)
    }
}

fn parse_or<L, T>(lookup: &L, key: &str, default: T) -> Result<T, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
