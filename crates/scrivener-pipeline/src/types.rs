//! Result, statistics and stream record types

use crate::error::{FailureCounts, PipelineError};
use scrivener_domain::{OutputFormat, PipelineType, ProgressEvent, Stage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-stage counts and timings for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Pipeline that ran
    pub pipeline_type: Option<PipelineType>,
    /// Characters received
    pub input_chars: usize,
    /// Characters processed after truncation
    pub processed_chars: usize,
    /// Whether the input was truncated
    pub truncated: bool,
    /// Chunks produced
    pub chunks: usize,
    /// Items extracted
    pub extracted: usize,
    /// Items after deduplication
    pub deduplicated: usize,
    /// Exact-match deduplication was used
    pub dedup_fallback: bool,
    /// Items classified
    pub classified: usize,
    /// Items kept by the filter
    pub filtered: usize,
    /// The filter rule could not be applied
    pub filter_fallback: bool,
    /// Variants generated
    pub variants_generated: usize,
    /// Variants surviving the quality stage
    pub variants_kept: usize,
    /// Soft failure counts
    pub failures: FailureCounts,
    /// Warning progress messages emitted
    pub warnings: usize,
    /// Reclamation points reached
    pub reclaim_requests: usize,
    /// Wall-clock time per stage
    pub stage_durations_ms: BTreeMap<Stage, u64>,
    /// Wall-clock time of the run
    pub duration_ms: u64,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// Always true for a returned result
    pub success: bool,
    /// Run statistics
    pub stats: PipelineStats,
    /// Encoded dataset
    pub output: String,
    /// Encoding of `output`
    pub format: OutputFormat,
    /// Object key the output was stored under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

/// Error body for streaming clients and batch outcomes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Short error message
    pub message: String,
    /// Longer description
    pub details: String,
    /// What the caller can try next
    pub recovery_suggestions: Vec<String>,
}

impl ErrorRecord {
    /// Error record for a document that exceeded its deadline
    pub fn timed_out(limit: Duration) -> Self {
        Self {
            message: format!("Document processing timed out after {}s", limit.as_secs()),
            details: "The run is still finishing in the background; its output is discarded."
                .to_string(),
            recovery_suggestions: vec![
                "Split the document into smaller files".to_string(),
                "Increase the document timeout".to_string(),
            ],
        }
    }
}

impl From<&PipelineError> for ErrorRecord {
    fn from(error: &PipelineError) -> Self {
        Self {
            message: error.to_string(),
            details: error.details(),
            recovery_suggestions: error.recovery_suggestions(),
        }
    }
}

/// One NDJSON line of a streaming response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamRecord {
    /// Progress update
    Progress(ProgressEvent),
    /// Final result
    Result(PipelineResult),
    /// Catastrophic failure
    Error(ErrorRecord),
}

impl StreamRecord {
    /// Serialize as one newline-terminated JSON line
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Whether this record ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamRecord::Progress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_stream_records_are_tagged() {
        let progress = StreamRecord::Progress(ProgressEvent {
            stage: Stage::Extraction,
            message: "Processed chunk 1/2".into(),
            progress: 22,
            timestamp: 1,
        });
        let line = progress.to_line().unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["stage"], "extraction");
        assert!(!progress.is_terminal());

        let error = StreamRecord::Error(ErrorRecord::from(&PipelineError::EmptyInput));
        let value: Value = serde_json::from_str(&error.to_line().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "Input text is empty");
        assert!(value["recovery_suggestions"].as_array().unwrap().len() >= 1);
        assert!(error.is_terminal());
    }

    #[test]
    fn test_result_record_shape() {
        let result = StreamRecord::Result(PipelineResult {
            success: true,
            stats: PipelineStats::default(),
            output: String::new(),
            format: OutputFormat::Csv,
            output_key: Some("output/legal_x.csv".into()),
        });
        let value: Value = serde_json::from_str(&result.to_line().unwrap()).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["format"], "csv");
        assert_eq!(value["output_key"], "output/legal_x.csv");
        assert_eq!(value["stats"]["failures"]["timeouts"], 0);
    }
}
