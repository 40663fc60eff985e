//! Job module - one tracked pipeline invocation against one document

use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job based on UUIDv7
///
/// UUIDv7 keeps job ids chronologically sortable, which makes store listings
/// come out in submission order without a separate timestamp index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// Generate a new UUIDv7-based JobId
    ///
    /// # Examples
    ///
    /// ```
    /// use scrivener_domain::JobId;
    ///
    /// let id = JobId::new();
    /// assert!(id.timestamp() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse a JobId from its string form
    ///
    /// # Examples
    ///
    /// ```
    /// use scrivener_domain::JobId;
    ///
    /// let id = JobId::new();
    /// let parsed = JobId::parse(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn parse(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid job id: {}", e))
    }

    /// Milliseconds since the Unix epoch encoded in the id
    pub fn timestamp(&self) -> u64 {
        (self.0.as_u128() >> 80) as u64
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job
///
/// `Queued → Processing → {Completed, CompletedWithWarnings, Failed, TimedOut}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not started
    Queued,
    /// Pipeline running
    Processing,
    /// Finished without soft timeouts
    Completed,
    /// Finished, but at least one call timed out
    CompletedWithWarnings,
    /// Aborted by a catastrophic error or the timeout threshold
    Failed,
    /// The document-level deadline passed before the run finished
    TimedOut,
}

impl JobStatus {
    /// Get the status name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::CompletedWithWarnings => "completed_with_warnings",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    /// Whether a transition from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => matches!(next, JobStatus::Processing | JobStatus::Failed),
            JobStatus::Processing => next != JobStatus::Queued,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status record exposed to polling clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Job identifier
    pub id: JobId,

    /// Current lifecycle state
    pub status: JobStatus,

    /// Percentage complete (0-100, never decreases)
    pub progress: u8,

    /// Stage currently executing, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,

    /// Latest progress message
    pub progress_message: String,

    /// Storage key of the output artifact once terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Error description for failed or timed-out jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Per-call timeouts observed so far
    pub timeouts: usize,
}

impl JobRecord {
    /// Create a freshly queued record
    pub fn queued(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            stage: None,
            progress_message: "Queued".to_string(),
            output_key: None,
            error: None,
            timeouts: 0,
        }
    }
}
