use serde::{Deserialize, Serialize};

/// Point-in-time view of a worker pool and its permits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub capacity: usize,
    pub available_permits: usize,
    pub in_flight: usize,
    pub live_workers: usize,
    pub accepting: bool,
}

impl PoolStatus {
    /// Every permit is back in the set.
    pub fn is_idle(&self) -> bool {
        self.available_permits == self.capacity
    }
}
