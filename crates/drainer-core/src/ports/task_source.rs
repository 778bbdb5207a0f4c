//! TaskSource port - ページ単位で work item を返す外部 producer
//!
//! cursor の状態とそのスレッド安全性は source 側の責務です。
//! 複数プロセスから同時に fetch されても cursor が壊れないようにするのも
//! source の仕事で、分散ロックは fetch 呼び出しを直列化するだけです。

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DEFAULT_CHUNK_SIZE;

/// A paginated provider of work items, supplied by the caller.
///
/// # 使用例
/// ```ignore
/// struct Orders { repo: OrderRepo }
///
/// #[async_trait]
/// impl TaskSource for Orders {
///     type Item = Order;
///
///     async fn fetch_batch(&self) -> anyhow::Result<Vec<Order>> {
///         self.repo.next_unprocessed(100).await
///     }
///
///     async fn execute_one(&self, order: &Order) -> anyhow::Result<()> {
///         self.repo.settle(order).await
///     }
///
///     fn description(&self) -> String { "settle pending orders".into() }
///     fn identity(&self) -> &str { "orders.settle" }
/// }
/// ```
#[async_trait]
pub trait TaskSource: Send + Sync + 'static {
    type Item: Debug + Send + Sync + 'static;

    /// Next page of items. An empty page ends the drain session.
    async fn fetch_batch(&self) -> anyhow::Result<Vec<Self::Item>>;

    /// Length of each chunk handed to one sub-batch worker.
    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }

    /// Process one item. Failures are logged and isolated to that item.
    async fn execute_one(&self, item: &Self::Item) -> anyhow::Result<()>;

    /// Human readable description, only used in logs.
    fn description(&self) -> String;

    /// Stable identity shared by every process draining this source.
    /// The lock key is derived from it.
    fn identity(&self) -> &str;
}
