//! App - アプリケーション層
//!
//! pool・lock・source を組み合わせて drain session を動かします。
//!
//! # 主要コンポーネント
//! - **DrainCoordinator**: session の開始と poll loop（lock → fetch → partition → fan-out）
//! - **execute_chunk**: sub-batch worker。item 単位で失敗を隔離する
//! - **completion**: permit の返却状況だけで完了を判定する

pub mod completion;
pub mod coordinator;
pub mod sub_batch;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::completion::{
    CompletionCheck, FINISH_CHECK_TIMEOUT, FINISH_POLL_INTERVAL, is_finished, is_finished_with,
    wait_until_finished, wait_until_finished_every,
};
pub use self::coordinator::{DEFAULT_LOCK_TTL, DrainCoordinator, SessionHandle};
pub use self::sub_batch::{ChunkReport, execute_chunk};
