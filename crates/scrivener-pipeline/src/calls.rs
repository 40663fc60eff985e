//! Shared plumbing for model-calling stages

use crate::config::PipelineConfiguration;
use crate::error::{CallFailure, FailureTally};
use crate::governor::MemoryGovernor;
use crate::progress::ProgressReporter;
use crate::prompt::PromptBuilder;
use scrivener_domain::{ChatProvider, ChatRequest, FailureSource, ModelRole, Stage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Provider wrapper enforcing the per-call timeout
pub struct ModelCaller<P> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P> Clone for ModelCaller<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            timeout: self.timeout,
        }
    }
}

impl<P: ChatProvider> ModelCaller<P> {
    /// Wrap `provider` with a per-call deadline
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Send one chat request
    ///
    /// The deadline only stops waiting; the provider sees no cancellation.
    pub async fn call(&self, request: ChatRequest) -> Result<String, CallFailure> {
        match tokio::time::timeout(self.timeout, self.provider.complete(&request)).await {
            Err(_) => Err(CallFailure::timeout(self.timeout)),
            Ok(Err(e)) => Err(CallFailure::new(e.failure_kind(), e.to_string())),
            Ok(Ok(content)) => Ok(content),
        }
    }
}

/// Everything a stage needs for one run
pub struct StageContext<P> {
    /// Timed provider access
    pub caller: ModelCaller<P>,
    /// Run configuration
    pub config: Arc<PipelineConfiguration>,
    /// Prompts for this pipeline type
    pub prompts: Arc<PromptBuilder>,
    /// Progress channel
    pub reporter: ProgressReporter,
    /// Reclamation points
    pub governor: Arc<MemoryGovernor>,
    /// Soft failure counters
    pub tally: Arc<FailureTally>,
}

impl<P> Clone for StageContext<P> {
    fn clone(&self) -> Self {
        Self {
            caller: self.caller.clone(),
            config: Arc::clone(&self.config),
            prompts: Arc::clone(&self.prompts),
            reporter: self.reporter.clone(),
            governor: Arc::clone(&self.governor),
            tally: Arc::clone(&self.tally),
        }
    }
}

impl<P: ChatProvider> StageContext<P> {
    /// Context for a run of `config` against `provider`
    pub fn new(provider: Arc<P>, config: Arc<PipelineConfiguration>, reporter: ProgressReporter) -> Self {
        let prompts = PromptBuilder::new(config.pipeline_type)
            .with_style_sample(config.style_sample.clone());
        Self {
            caller: ModelCaller::new(provider, config.settings.call_timeout()),
            governor: Arc::new(MemoryGovernor::new(config.settings.reclaim_pause())),
            prompts: Arc::new(prompts),
            tally: Arc::new(FailureTally::new()),
            reporter,
            config,
        }
    }

    /// Model configured for `role`
    pub fn model(&self, role: ModelRole) -> &str {
        self.config.models.model_for(role)
    }

    /// Count, log and surface a soft failure
    pub fn soft_failure(&self, stage: Stage, what: &str, failure: &CallFailure) {
        self.tally.record(failure);
        self.reporter.warn(stage, format!("{} failed: {}", what, failure));
    }

    /// Whether per-call timeouts reached the abort threshold
    pub fn timeout_limit_reached(&self) -> bool {
        self.tally.timeouts() >= self.config.settings.timeout_failure_threshold
    }
}

/// Batch size and per-group concurrency for [`run_in_groups`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSizes {
    /// Items per batch
    pub batch: usize,
    /// Tasks in flight per group
    pub concurrency: usize,
}

impl GroupSizes {
    /// Sizes clamped to at least one
    pub fn new(batch: usize, concurrency: usize) -> Self {
        Self {
            batch: batch.max(1),
            concurrency: concurrency.max(1),
        }
    }
}

/// Why an item has no task result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandoned {
    /// The task panicked or was aborted
    Aborted,
    /// The run stopped before the item's group started
    Skipped,
}

/// Run `task` over `items` in batches, `sizes.concurrency` at a time
///
/// Output order follows input order. `should_stop` is checked before every
/// group; once it returns true no further tasks start and every remaining
/// item is replaced by `on_abort(item, Abandoned::Skipped)`. A task that
/// panics is replaced by `on_abort(item, Abandoned::Aborted)`.
/// `after_group(done, total)` runs after every group, and the governor
/// reclaims after every group and every batch.
pub async fn run_in_groups<T, R, F, Fut, S, A, G>(
    items: Vec<T>,
    sizes: GroupSizes,
    governor: &MemoryGovernor,
    should_stop: S,
    task: F,
    on_abort: A,
    mut after_group: G,
) -> Vec<R>
where
    T: Clone,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    S: Fn() -> bool,
    A: Fn(T, Abandoned) -> R,
    G: FnMut(usize, usize),
{
    let total = items.len();
    let GroupSizes { batch, concurrency } = GroupSizes::new(sizes.batch, sizes.concurrency);
    let mut results = Vec::with_capacity(total);
    let mut done = 0;
    let mut remaining = items.into_iter();

    'batches: loop {
        let current: Vec<T> = remaining.by_ref().take(batch).collect();
        if current.is_empty() {
            break;
        }
        let mut current = current.into_iter();
        loop {
            if should_stop() {
                warn!("Stopping early; skipping {} of {} items", total - done, total);
                results.extend(
                    current
                        .by_ref()
                        .chain(remaining.by_ref())
                        .map(|item| on_abort(item, Abandoned::Skipped)),
                );
                break 'batches;
            }

            let group: Vec<T> = current.by_ref().take(concurrency).collect();
            if group.is_empty() {
                break;
            }
            let size = group.len();
            let mut set = JoinSet::new();
            for (index, item) in group.iter().cloned().enumerate() {
                let fut = task(item);
                set.spawn(async move { (index, fut.await) });
            }

            let mut slots: Vec<Option<R>> = (0..size).map(|_| None).collect();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((index, result)) => slots[index] = Some(result),
                    Err(e) => warn!("Group task ended abnormally: {}", e),
                }
            }
            for (slot, item) in slots.into_iter().zip(group) {
                results.push(match slot {
                    Some(result) => result,
                    None => on_abort(item, Abandoned::Aborted),
                });
            }

            done += size;
            debug!("Completed group: {}/{}", done, total);
            after_group(done, total);
            governor.reclaim().await;
        }
        governor.reclaim().await;
    }

    results
}
