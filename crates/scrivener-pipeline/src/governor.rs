//! Memory governor - reclamation points and hard caps
//!
//! Each stage owns its input and returns a fresh output, so the previous
//! collection is freed when the stage returns. The governor adds explicit
//! yield points between calls and keeps the caps in one place.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Cooperative reclamation and truncation helpers for one run
#[derive(Debug)]
pub struct MemoryGovernor {
    pause: Duration,
    requests: AtomicUsize,
}

impl MemoryGovernor {
    /// Governor pausing for `pause` at each reclamation point
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            requests: AtomicUsize::new(0),
        }
    }

    /// Yield to the runtime and optionally pause
    pub async fn reclaim(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
    }

    /// Reclamation points reached so far
    pub fn reclaim_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Keep at most `cap` items
    pub fn cap<T>(&self, mut items: Vec<T>, cap: usize, what: &str) -> Vec<T> {
        if items.len() > cap {
            debug!("Capping {} from {} to {}", what, items.len(), cap);
            items.truncate(cap);
        }
        items
    }
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
