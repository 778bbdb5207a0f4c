//! Domain model (session ids, lock keys, chunking, terminal states).

pub mod chunk;
pub mod ids;
pub mod lock_key;
pub mod state;

pub use chunk::{DEFAULT_CHUNK_SIZE, partition};
pub use ids::SessionId;
pub use lock_key::{DEFAULT_LOCK_KEY_PREFIX, LockKey};
pub use state::{AbortReason, SessionStats, Termination};
