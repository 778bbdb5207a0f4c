//! State - drain session の終了状態
//!
//! poll loop は `Completed` か `Aborted` のどちらかで終わります。
//! どちらの場合も pool の shutdown と poll permit の返却が 1 回だけ行われます。

use serde::{Deserialize, Serialize};

/// Why a poll loop stopped before the source ran dry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// Another process holds the fetch lock. Not retried.
    LockUnavailable,
    /// The lock backend returned an error on acquire.
    LockFailed(String),
    /// The source failed (or panicked) while fetching a batch.
    SourceFetch(String),
    /// The session token fired while waiting for a permit.
    Cancelled,
    /// The pool refused a sub-batch (permit accounting bug).
    Rejected,
}

/// Counters accumulated by one poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Non-empty batches fetched.
    pub pages: usize,
    /// Sub-batch workers handed to the pool.
    pub chunks: usize,
    /// Items inside those sub-batches.
    pub items: usize,
}

/// Terminal state of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    /// The source returned an empty batch.
    Completed(SessionStats),
    Aborted {
        reason: AbortReason,
        stats: SessionStats,
    },
}

impl Termination {
    pub fn stats(&self) -> SessionStats {
        match self {
            Termination::Completed(stats) => *stats,
            Termination::Aborted { stats, .. } => *stats,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Termination::Completed(_))
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Termination::Completed(_) => None,
            Termination::Aborted { reason, .. } => Some(reason),
        }
    }
}
