//! Error types for the pipeline
//!
//! Two tiers: [`PipelineError`] aborts a run, [`CallFailure`] is a recoverable
//! per-chunk or per-item outcome that is counted and skipped.

use scrivener_domain::FailureKind;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Conditions that make further progress impossible
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input text is empty or whitespace
    #[error("Input text is empty")]
    EmptyInput,

    /// Input object could not be read
    #[error("Input not found: {0}")]
    MissingInput(String),

    /// Invalid configuration or request
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunking produced nothing to process
    #[error("Chunking produced no chunks from {0} characters")]
    Chunking(usize),

    /// Object or job storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Per-call timeouts reached the failure threshold
    #[error("Too many model timeouts: {count} (threshold {threshold})")]
    TooManyTimeouts {
        /// Timeouts observed
        count: usize,
        /// Configured threshold
        threshold: usize,
    },

    /// The run task ended without producing a result
    #[error("Pipeline task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Longer description for error records
    pub fn details(&self) -> String {
        match self {
            PipelineError::EmptyInput => {
                "The document contained no text after extraction and truncation.".to_string()
            }
            PipelineError::MissingInput(key) => {
                format!("No object exists under key '{}'.", key)
            }
            PipelineError::Config(msg) => msg.clone(),
            PipelineError::Chunking(chars) => format!(
                "{} characters of input yielded no chunk meeting the minimum length.",
                chars
            ),
            PipelineError::Storage(msg) => msg.clone(),
            PipelineError::TooManyTimeouts { count, threshold } => format!(
                "{} model calls timed out; runs are aborted once {} timeouts accumulate.",
                count, threshold
            ),
            PipelineError::Aborted(msg) => msg.clone(),
        }
    }

    /// Suggestions shown to the caller alongside the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let suggestions: &[&str] = match self {
            PipelineError::EmptyInput => &[
                "Check that text extraction succeeded for the source document",
                "Upload a document that contains selectable text",
            ],
            PipelineError::MissingInput(_) => &[
                "Verify the textKey returned by the upload step",
                "Re-upload the document and retry",
            ],
            PipelineError::Config(_) => &[
                "Check pipelineType, outputFormat and filter values",
                "Ensure chunkOverlap is smaller than chunkSize",
            ],
            PipelineError::Chunking(_) => &[
                "Lower the chunk size or minimum chunk length",
                "Check that the document is not mostly whitespace",
            ],
            PipelineError::Storage(_) => &[
                "Check storage permissions and free space",
                "Retry the job once storage is reachable",
            ],
            PipelineError::TooManyTimeouts { .. } => &[
                "Retry later; the model endpoint may be overloaded",
                "Split the document into smaller files",
                "Increase the per-call timeout",
            ],
            PipelineError::Aborted(_) => &["Retry the job", "Check server logs for a panic"],
        };
        suggestions.iter().map(|s| s.to_string()).collect()
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}

/// A recoverable failure of one model call or one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Description for logs and warnings
    pub message: String,
}

impl CallFailure {
    /// Failure of the given kind
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Call exceeded its deadline
    pub fn timeout(after: Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("timed out after {:?}", after))
    }

    /// Model answer could not be interpreted
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }

    /// Provider or transport failure
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Api, message)
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

/// Counts of soft failures in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FailureCounts {
    /// Calls that timed out
    pub timeouts: usize,
    /// Provider/transport errors
    pub api_errors: usize,
    /// Unparseable answers
    pub parse_errors: usize,
}

impl FailureCounts {
    /// Sum of all categories
    pub fn total(&self) -> usize {
        self.timeouts + self.api_errors + self.parse_errors
    }
}

/// Thread-safe failure counter shared by concurrent stage tasks
#[derive(Debug, Default)]
pub struct FailureTally {
    timeouts: AtomicUsize,
    api_errors: AtomicUsize,
    parse_errors: AtomicUsize,
}

impl FailureTally {
    /// Create an empty tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one failure
    pub fn record(&self, failure: &CallFailure) {
        let counter = match failure.kind {
            FailureKind::Timeout => &self.timeouts,
            FailureKind::Api => &self.api_errors,
            FailureKind::Parse => &self.parse_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Timeouts so far
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> FailureCounts {
        FailureCounts {
            timeouts: self.timeouts.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}
