//! Sub-batch worker: runs one chunk item by item.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::domain::SessionId;
use crate::pool::Permit;
use crate::ports::TaskSource;

/// Per-chunk result counts, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Execute every item of `chunk` in order, then release `permit`.
///
/// An item that fails or panics is logged and skipped; the rest of the chunk
/// still runs. The permit is released exactly once, after the last item.
pub async fn execute_chunk<S: TaskSource>(
    source: Arc<S>,
    chunk: Vec<S::Item>,
    permit: Permit,
    session: SessionId,
) -> ChunkReport {
    let mut report = ChunkReport::default();

    for item in &chunk {
        tracing::debug!(%session, ?item, "executing item");
        match AssertUnwindSafe(source.execute_one(item)).catch_unwind().await {
            Ok(Ok(())) => report.succeeded += 1,
            Ok(Err(err)) => {
                report.failed += 1;
                tracing::error!(
                    %session,
                    source = %source.description(),
                    ?item,
                    error = %format!("{err:#}"),
                    "item execution failed"
                );
            }
            Err(_) => {
                report.failed += 1;
                tracing::error!(
                    %session,
                    source = %source.description(),
                    ?item,
                    "item execution panicked"
                );
            }
        }
    }

    permit.release();
    tracing::debug!(
        %session,
        succeeded = report.succeeded,
        failed = report.failed,
        "chunk finished"
    );
    report
}
