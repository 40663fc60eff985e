//! Scrivener Pipeline
//!
//! Turns one document's text into a synthetic training dataset using a
//! chat-completion model.
//!
//! # Overview
//!
//! Every run passes through the same stages in strict sequence, each owning
//! its input and returning a new output:
//!
//! ```text
//! text → truncate → chunk → extract → dedup → classify → filter
//!      → generate variants → quality filter → format
//! ```
//!
//! Legal and QA pipelines work on clauses; the finance pipeline works on
//! metric sets. Model failures are soft: each is counted in a failure tally,
//! surfaced as a `Warning:` progress message, and the item is defaulted or
//! skipped. Only catastrophic conditions (empty input, invalid
//! configuration, storage failure, too many timeouts) end a run with an
//! error.
//!
//! # Key Features
//!
//! - **Bounded work**: text, chunk, item and variant caps from [`PipelineSettings`]
//! - **Bounded concurrency**: batched groups of model calls with reclamation points
//! - **Monotonic progress**: [`ProgressReporter`] over a tokio channel
//! - **Jobs**: [`JobRunner`] with a document deadline, stored output and pollable status
//! - **Batches**: [`BatchRunner`] for several documents, one at a time
//!
//! # Example Usage
//!
//! ```no_run
//! use scrivener_pipeline::{Pipeline, PipelineConfiguration, ProgressReporter};
//! use scrivener_domain::{OutputFormat, PipelineType};
//! use scrivener_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(MockProvider::new("Standard"));
//! let config = PipelineConfiguration::new(PipelineType::Legal)
//!     .with_output_format(OutputFormat::OpenAiJsonl);
//! let pipeline = Pipeline::new(provider, config)?;
//!
//! let (reporter, mut events) = ProgressReporter::channel();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("[{:>3}%] {}", event.progress, event.message);
//!     }
//! });
//!
//! let result = pipeline.process("The Supplier shall deliver the goods.", reporter).await?;
//! println!("{} variants kept", result.stats.variants_kept);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod batch;
mod config;
mod error;
mod job;
mod pipeline;
mod progress;
mod types;

pub mod calls;
pub mod chunking;
pub mod classifier;
pub mod dedup;
pub mod extractor;
pub mod filter;
pub mod formatter;
pub mod generator;
pub mod governor;
pub mod parser;
pub mod prompt;
pub mod quality;
pub mod sentence;

#[cfg(test)]
mod tests;

pub use batch::{BatchRunner, DocumentEvent, DocumentInput, DocumentOutcome};
pub use config::{FilterRule, PipelineConfiguration, PipelineRequest, PipelineSettings};
pub use error::{CallFailure, FailureCounts, FailureTally, PipelineError};
pub use job::{JobRunner, RunOutcome};
pub use pipeline::Pipeline;
pub use progress::ProgressReporter;
pub use types::{ErrorRecord, PipelineResult, PipelineStats, StreamRecord};
