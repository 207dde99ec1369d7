//! Sequential pipeline runner.
//!
//! Runs one async action per item, in input order, and collects the results
//! in input order. The default is strictly one action in flight: the action
//! for item `n + 1` is not created until item `n` has resolved. Remote hosts
//! behind the scraped pages react badly to bursts, so serialization replaces
//! a rate limiter.
//!
//! A run moves `Pending -> Running(i) -> Running(i + 1) | Failed | Done`.
//! The first failing item ends the run: later items are never started and
//! results collected so far are dropped.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

/// One progress update: how many items are done and the total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
}

/// Called after each item completes successfully.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Pipeline settings.
#[derive(Clone)]
pub struct Pipeline {
    limit: usize,
    progress: Option<ProgressSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("limit", &self.limit)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::sequential()
    }
}

impl Pipeline {
    /// One action in flight at a time.
    pub fn sequential() -> Self {
        Self {
            limit: 1,
            progress: None,
        }
    }

    /// Up to `limit` actions in flight; results still come back in input
    /// order and the run is still fail-fast. A limit of 0 is treated as 1.
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `action` over `items`.
    pub async fn run<I, O, E, F, Fut>(&self, items: Vec<I>, mut action: F) -> Result<Vec<O>, E>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        if self.limit == 1 {
            for (index, item) in items.into_iter().enumerate() {
                debug!(index, total, "pipeline item started");
                results.push(action(item).await?);
                self.report(results.len(), total);
            }
        } else {
            let mut outputs = stream::iter(items).map(action).buffered(self.limit);
            while let Some(output) = outputs.next().await {
                results.push(output?);
                self.report(results.len(), total);
            }
        }

        debug!(total, "pipeline done");
        Ok(results)
    }

    fn report(&self, done: usize, total: usize) {
        if let Some(sink) = &self.progress {
            sink(ProgressEvent { done, total });
        }
    }
}

/// Run `action` over `items` strictly one at a time, in order, fail-fast.
pub async fn run_sequential<I, O, E, F, Fut>(items: Vec<I>, action: F) -> Result<Vec<O>, E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    Pipeline::sequential().run(items, action).await
}

/// Run `action` over `items` with at most `limit` in flight, results in input
/// order, fail-fast.
pub async fn run_bounded<I, O, E, F, Fut>(
    items: Vec<I>,
    limit: usize,
    action: F,
) -> Result<Vec<O>, E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    Pipeline::bounded(limit).run(items, action).await
}
