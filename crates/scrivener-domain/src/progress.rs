//! Progress module - stages and the events emitted as a run advances

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage
///
/// Stages execute strictly in declaration order. Each owns a band of the
/// 0-100 progress range so that percentages never move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Splitting text into chunks
    Chunking,
    /// Pulling candidate items out of chunks
    Extraction,
    /// Collapsing near-duplicate items
    Deduplication,
    /// Labelling items
    Classification,
    /// Applying user inclusion rules
    Filtering,
    /// Producing rewritten variants
    Generation,
    /// Scoring and dropping weak variants
    QualityFiltering,
    /// Serializing the final dataset
    Formatting,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 8] = [
        Stage::Chunking,
        Stage::Extraction,
        Stage::Deduplication,
        Stage::Classification,
        Stage::Filtering,
        Stage::Generation,
        Stage::QualityFiltering,
        Stage::Formatting,
    ];

    /// Get the stage name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Chunking => "chunking",
            Stage::Extraction => "extraction",
            Stage::Deduplication => "deduplication",
            Stage::Classification => "classification",
            Stage::Filtering => "filtering",
            Stage::Generation => "generation",
            Stage::QualityFiltering => "quality_filtering",
            Stage::Formatting => "formatting",
        }
    }

    /// Progress band `(start, end)` owned by this stage
    pub fn band(&self) -> (u8, u8) {
        match self {
            Stage::Chunking => (0, 10),
            Stage::Extraction => (10, 35),
            Stage::Deduplication => (35, 40),
            Stage::Classification => (40, 60),
            Stage::Filtering => (60, 65),
            Stage::Generation => (65, 85),
            Stage::QualityFiltering => (85, 95),
            Stage::Formatting => (95, 100),
        }
    }

    /// Progress value for a fraction `done / total` of this stage
    pub fn progress_at(&self, done: usize, total: usize) -> u8 {
        let (start, end) = self.band();
        if total == 0 {
            return end;
        }
        let span = (end - start) as usize;
        let step = (span * done.min(total)) / total;
        start + step as u8
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured progress notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage that produced the event
    pub stage: Stage,

    /// Human-readable message; soft failures are prefixed with `Warning:`
    pub message: String,

    /// Percentage complete (0-100)
    pub progress: u8,

    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl ProgressEvent {
    /// Whether this event reports a soft failure
    pub fn is_warning(&self) -> bool {
        self.message.starts_with(WARNING_PREFIX)
    }
}

/// Prefix marking soft-failure progress messages
pub const WARNING_PREFIX: &str = "Warning:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_contiguous_and_ordered() {
        let mut previous_end = 0;
        for stage in Stage::ALL {
            let (start, end) = stage.band();
            assert_eq!(start, previous_end);
            assert!(end > start);
            previous_end = end;
        }
        assert_eq!(previous_end, 100);
    }

    #[test]
    fn test_progress_at() {
        assert_eq!(Stage::Extraction.progress_at(0, 10), 10);
        assert_eq!(Stage::Extraction.progress_at(10, 10), 35);
        assert_eq!(Stage::Extraction.progress_at(20, 10), 35);
        assert_eq!(Stage::Classification.progress_at(0, 0), 60);
    }

    proptest::proptest! {
        #[test]
        fn prop_progress_stays_in_band(done in 0usize..500, total in 0usize..500, idx in 0usize..8) {
            let stage = Stage::ALL[idx];
            let (start, end) = stage.band();
            let value = stage.progress_at(done, total);
            proptest::prop_assert!(value >= start && value <= end);
        }
    }

    #[test]
    fn test_stage_wire_names() {
        let json = serde_json::to_string(&Stage::QualityFiltering).unwrap();
        assert_eq!(json, "\"quality_filtering\"");
        assert_eq!(Stage::QualityFiltering.to_string(), "quality_filtering");
    }
}
