//! Ports - 外部 capability の抽象化レイヤー
//!
//! drain の core はここにある trait にだけ依存し、具体的な store や
//! producer は呼び出し側が注入します。

pub mod distributed_lock;
pub mod task_source;

pub use self::distributed_lock::DistributedLock;
pub use self::task_source::TaskSource;
