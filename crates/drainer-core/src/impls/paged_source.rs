//! PagedSource - 開発用のページング source
//!
//! メモリ上の item 列を `page_size` 件ずつ返し、使い切ったら空ページを返します。
//! cursor は `Mutex` で守られているので、複数 session から同時に fetch しても
//! 同じ item が 2 回返ることはありません。

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::DEFAULT_CHUNK_SIZE;
use crate::ports::TaskSource;

/// In-memory [`TaskSource`] executing items with a caller-supplied closure.
///
/// # 使用例
/// ```ignore
/// let source = PagedSource::new("demo.numbers", 1..=100, |n: &u32| {
///     tracing::info!(n, "processing");
///     Ok(())
/// })
/// .with_page_size(20);
/// ```
pub struct PagedSource<T, F> {
    identity: String,
    description: String,
    page_size: usize,
    chunk_size: usize,
    pending: Mutex<VecDeque<T>>,
    handler: F,
}

impl<T, F> PagedSource<T, F>
where
    T: Debug + Send + Sync + 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(identity: impl Into<String>, items: impl IntoIterator<Item = T>, handler: F) -> Self {
        let identity = identity.into();
        Self {
            description: format!("paged source {identity}"),
            identity,
            page_size: 100,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pending: Mutex::new(items.into_iter().collect()),
            handler,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Items not yet handed out by `fetch_batch`.
    pub fn remaining(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl<T, F> TaskSource for PagedSource<T, F>
where
    T: Debug + Send + Sync + 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    type Item = T;

    async fn fetch_batch(&self) -> anyhow::Result<Vec<T>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let take = self.page_size.min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn execute_one(&self, item: &T) -> anyhow::Result<()> {
        (self.handler)(item)
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}
