//! Scriptable `TaskSource` shared by the app tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::ports::TaskSource;

pub(crate) struct ScriptedSource {
    identity: String,
    chunk_size: usize,
    pages: Mutex<VecDeque<anyhow::Result<Vec<u32>>>>,
    fail_on: Option<u32>,
    panic_on: Option<u32>,
    item_delay: Duration,
    fetch_gate: Option<CancellationToken>,
    item_gate: Option<CancellationToken>,
    pub fetch_entered: Notify,
    pub item_started: Notify,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempted: Mutex<Vec<u32>>,
    succeeded: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    /// Hands out `pages` in order, then empty batches forever.
    pub fn new(identity: &str, pages: Vec<Vec<u32>>) -> Self {
        Self {
            identity: identity.to_string(),
            chunk_size: 5,
            pages: Mutex::new(pages.into_iter().map(Ok).collect()),
            fail_on: None,
            panic_on: None,
            item_delay: Duration::ZERO,
            fetch_gate: None,
            item_gate: None,
            fetch_entered: Notify::new(),
            item_started: Notify::new(),
            fetch_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            attempted: Mutex::new(Vec::new()),
            succeeded: Mutex::new(Vec::new()),
        }
    }

    /// The first fetch fails.
    pub fn failing_fetch(identity: &str) -> Self {
        let source = Self::new(identity, vec![]);
        source
            .pages
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("backing table unavailable")));
        source
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn fail_on(mut self, item: u32) -> Self {
        self.fail_on = Some(item);
        self
    }

    pub fn panic_on(mut self, item: u32) -> Self {
        self.panic_on = Some(item);
        self
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Every fetch waits until `gate` is cancelled.
    pub fn gate_fetch(mut self, gate: CancellationToken) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    /// Every item waits until `gate` is cancelled.
    pub fn gate_items(mut self, gate: CancellationToken) -> Self {
        self.item_gate = Some(gate);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn attempted(&self) -> Vec<u32> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn succeeded(&self) -> Vec<u32> {
        self.succeeded.lock().unwrap().clone()
    }

    pub fn succeeded_sorted(&self) -> Vec<u32> {
        let mut items = self.succeeded();
        items.sort_unstable();
        items
    }
}

#[async_trait]
impl TaskSource for ScriptedSource {
    type Item = u32;

    async fn fetch_batch(&self) -> anyhow::Result<Vec<u32>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_entered.notify_one();
        if let Some(gate) = &self.fetch_gate {
            gate.cancelled().await;
        }
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn execute_one(&self, item: &u32) -> anyhow::Result<()> {
        self.attempted.lock().unwrap().push(*item);
        self.item_started.notify_one();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.item_gate {
            gate.cancelled().await;
        }
        if !self.item_delay.is_zero() {
            tokio::time::sleep(self.item_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on == Some(*item) {
            panic!("item {item} blew up");
        }
        if self.fail_on == Some(*item) {
            anyhow::bail!("item {item} rejected by downstream");
        }
        self.succeeded.lock().unwrap().push(*item);
        Ok(())
    }

    fn description(&self) -> String {
        format!("scripted source {}", self.identity)
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}
