//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file error
    #[error(transparent)]
    ConfigFile(#[from] scrivener_server::config::ConfigError),

    /// Pipeline aborted
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] scrivener_pipeline::PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A document could not be processed
    #[error("{}", .0.message)]
    Document(scrivener_pipeline::ErrorRecord),

    /// Some documents in a batch failed
    #[error("{failed} of {total} documents failed")]
    BatchFailed {
        /// Failed documents
        failed: usize,
        /// Documents in the batch
        total: usize,
    },
}
