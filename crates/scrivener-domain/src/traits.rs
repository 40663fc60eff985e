//! Trait definitions for external interactions
//!
//! These traits define the boundaries between pipeline logic and
//! infrastructure. Implementations live in other crates.

use crate::chat::ChatRequest;
use crate::job::{JobId, JobRecord};
use std::future::Future;

/// Category of a recoverable per-call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The call did not answer in time
    Timeout,
    /// Network, rate limit or provider error
    Api,
    /// The answer could not be interpreted
    Parse,
}

impl FailureKind {
    /// Get the kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Api => "api",
            FailureKind::Parse => "parse",
        }
    }
}

/// Errors that can report which recoverable category they fall into
pub trait FailureSource {
    /// Category of this failure
    fn failure_kind(&self) -> FailureKind;
}

/// Trait for chat-completion providers
///
/// Implemented by the infrastructure layer (scrivener-llm)
pub trait ChatProvider: Send + Sync {
    /// Error type for provider operations
    type Error: std::error::Error + FailureSource + Send + Sync + 'static;

    /// Run one chat completion and return the message content
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Trait for the object storage collaborator
///
/// Implemented by the infrastructure layer (scrivener-store)
pub trait ObjectStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read an object
    fn get(&self, key: &str) -> Result<Vec<u8>, Self::Error>;

    /// Write an object and return the key it was stored under
    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<String, Self::Error>;
}

/// Trait for job status records
///
/// Implemented by the infrastructure layer (scrivener-store)
pub trait JobStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a new record
    fn insert(&self, record: JobRecord) -> Result<(), Self::Error>;

    /// Get a record by id
    fn get(&self, id: JobId) -> Result<Option<JobRecord>, Self::Error>;

    /// Apply `update` to a record and return the updated copy
    fn update<F>(&self, id: JobId, update: F) -> Result<Option<JobRecord>, Self::Error>
    where
        F: FnOnce(&mut JobRecord);

    /// All records, oldest first
    fn list(&self) -> Result<Vec<JobRecord>, Self::Error>;
}
