//! Progress reporting over an mpsc channel

use scrivener_domain::{ProgressEvent, Stage, WARNING_PREFIX};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
struct ReporterInner {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last: AtomicU8,
    warnings: AtomicUsize,
}

/// Sends progress events for one run
///
/// Cheap to clone; clones share the same channel and the same high-water
/// mark, so concurrent stage tasks can never move progress backwards.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

impl ProgressReporter {
    /// Reporter plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(Some(tx)), rx)
    }

    /// Reporter that only tracks progress and logs
    pub fn silent() -> Self {
        Self::with_sender(None)
    }

    fn with_sender(sender: Option<mpsc::UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                sender,
                last: AtomicU8::new(0),
                warnings: AtomicUsize::new(0),
            }),
        }
    }

    /// Report `progress` (clamped to 0-100 and to the previous value) for `stage`
    pub fn report(&self, stage: Stage, progress: u8, message: impl Into<String>) {
        let requested = progress.min(100);
        let previous = self.inner.last.fetch_max(requested, Ordering::SeqCst);
        let progress = previous.max(requested);
        let message = message.into();
        debug!(stage = %stage, progress, "{}", message);
        self.send(ProgressEvent {
            stage,
            message,
            progress,
            timestamp: now_millis(),
        });
    }

    /// Report a soft failure at the current progress
    pub fn warn(&self, stage: Stage, message: impl AsRef<str>) {
        self.inner.warnings.fetch_add(1, Ordering::Relaxed);
        let message = format!("{} {}", WARNING_PREFIX, message.as_ref());
        warn!(stage = %stage, "{}", message);
        self.send(ProgressEvent {
            stage,
            message,
            progress: self.last_progress(),
            timestamp: now_millis(),
        });
    }

    /// Highest progress reported so far
    pub fn last_progress(&self) -> u8 {
        self.inner.last.load(Ordering::SeqCst)
    }

    /// Warnings reported so far
    pub fn warning_count(&self) -> usize {
        self.inner.warnings.load(Ordering::Relaxed)
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.inner.sender {
            // Receiver gone means nobody is listening any more; the run continues.
            if sender.send(event).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
