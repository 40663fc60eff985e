//! Scrivener Domain Layer
//!
//! This crate contains the data model shared by every Scrivener layer: the
//! items a document is broken into, their classifications and variants, the
//! progress events a run emits, and the job records callers poll. It also
//! defines the trait seams for the external collaborators (chat-completion
//! providers, object storage, job storage).
//!
//! ## Key Concepts
//!
//! - **Item**: a clause or a financial metric set pulled out of a chunk
//! - **Classification**: Critical/Important/Standard, or per-field metric labels
//! - **Variant**: a rewritten version of an item's text, at most three per item
//! - **Progress event**: `{stage, message, progress}` emitted as a run advances
//! - **Job**: one pipeline invocation tracked to a terminal state
//!
//! ## Architecture
//!
//! - Only serde and uuid as external dependencies
//! - No I/O; infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod classification;
pub mod item;
pub mod job;
pub mod progress;
pub mod traits;
pub mod variant;

// Re-exports for convenience
pub use chat::{ChatMessage, ChatRequest, ModelRole, Role};
pub use classification::{Classification, ClauseLabel, MetricLabel};
pub use item::{Flavor, Item, MetricSet, OutputFormat, PipelineType};
pub use job::{JobId, JobRecord, JobStatus};
pub use progress::{ProgressEvent, Stage, WARNING_PREFIX};
pub use traits::{ChatProvider, FailureKind, FailureSource, JobStore, ObjectStore};
pub use variant::{AssessedVariantSet, ClassifiedItem, QualityMetrics, VariantSet, MAX_VARIANTS};
