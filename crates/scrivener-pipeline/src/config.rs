//! Configuration for the pipeline

use crate::error::PipelineError;
use scrivener_domain::{Flavor, OutputFormat, PipelineType};
use scrivener_llm::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits, batch sizes and timeouts for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Input is truncated to this many characters before chunking
    pub max_text_length: usize,

    /// Shortest chunk emitted (characters)
    pub chunk_min_length: usize,

    /// Longest chunk emitted (characters)
    pub chunk_max_length: usize,

    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,

    /// Maximum chunks per document
    pub max_chunks: usize,

    /// Ceiling on user content per model call (characters)
    pub max_call_chars: usize,

    /// Longest extracted item or variant kept (characters)
    pub max_item_length: usize,

    /// Shortest variant kept (characters)
    pub min_variant_length: usize,

    /// Items kept before classification
    pub pre_classification_cap: usize,

    /// Clauses kept after filtering
    pub clause_cap: usize,

    /// Metric sets kept after filtering
    pub metrics_cap: usize,

    /// Clauses kept when a filter rule cannot be applied
    pub clause_fallback_count: usize,

    /// Metric sets kept when a filter rule cannot be applied
    pub metrics_fallback_count: usize,

    /// Items per classification batch
    pub classification_batch_size: usize,

    /// Concurrent classification calls
    pub classification_concurrency: usize,

    /// Items per generation batch
    pub generation_batch_size: usize,

    /// Concurrent generation calls
    pub generation_concurrency: usize,

    /// Items per quality batch, evaluated concurrently
    pub quality_batch_size: usize,

    /// Variants at or above this Jaccard similarity are dropped by the fallback filter
    pub similarity_threshold: f64,

    /// Deadline for one model call (seconds)
    pub call_timeout_secs: u64,

    /// Deadline for one document (seconds)
    pub document_timeout_secs: u64,

    /// Per-call timeouts that abort the run
    pub timeout_failure_threshold: usize,

    /// Pause after each reclamation point (milliseconds)
    pub reclaim_pause_ms: u64,

    /// Delay between documents in a batch (milliseconds)
    pub inter_document_delay_ms: u64,
}

impl PipelineSettings {
    /// Per-call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Document timeout as a Duration
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    /// Reclamation pause as a Duration
    pub fn reclaim_pause(&self) -> Duration {
        Duration::from_millis(self.reclaim_pause_ms)
    }

    /// Inter-document delay as a Duration
    pub fn inter_document_delay(&self) -> Duration {
        Duration::from_millis(self.inter_document_delay_ms)
    }

    /// Post-filter cap for `flavor`
    pub fn cap_for(&self, flavor: Flavor) -> usize {
        match flavor {
            Flavor::Clause => self.clause_cap,
            Flavor::Metrics => self.metrics_cap,
        }
    }

    /// Filter fallback count for `flavor`
    pub fn fallback_count_for(&self, flavor: Flavor) -> usize {
        match flavor {
            Flavor::Clause => self.clause_fallback_count,
            Flavor::Metrics => self.metrics_fallback_count,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if self.chunk_min_length == 0 {
            return Err("chunk_min_length must be greater than 0".to_string());
        }
        if self.chunk_min_length >= self.chunk_max_length {
            return Err("chunk_min_length must be smaller than chunk_max_length".to_string());
        }
        if self.chunk_overlap >= self.chunk_max_length {
            return Err("chunk_overlap must be smaller than chunk_max_length".to_string());
        }
        if self.max_chunks == 0 {
            return Err("max_chunks must be greater than 0".to_string());
        }
        if self.max_call_chars == 0 {
            return Err("max_call_chars must be greater than 0".to_string());
        }
        if self.min_variant_length > self.max_item_length {
            return Err("min_variant_length cannot exceed max_item_length".to_string());
        }
        let sizes = [
            ("classification_batch_size", self.classification_batch_size),
            ("classification_concurrency", self.classification_concurrency),
            ("generation_batch_size", self.generation_batch_size),
            ("generation_concurrency", self.generation_concurrency),
            ("quality_batch_size", self.quality_batch_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(format!("{} must be greater than 0", name));
            }
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.call_timeout_secs == 0 {
            return Err("call_timeout_secs must be greater than 0".to_string());
        }
        if self.document_timeout_secs < self.call_timeout_secs {
            return Err("document_timeout_secs cannot be shorter than call_timeout_secs".to_string());
        }
        if self.timeout_failure_threshold == 0 {
            return Err("timeout_failure_threshold must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 5_000,
            chunk_min_length: 200,
            chunk_max_length: 1_500,
            chunk_overlap: 100,
            max_chunks: 20,
            max_call_chars: 4_000,
            max_item_length: 1_000,
            min_variant_length: 20,
            pre_classification_cap: 50,
            clause_cap: 50,
            metrics_cap: 30,
            clause_fallback_count: 20,
            metrics_fallback_count: 10,
            classification_batch_size: 20,
            classification_concurrency: 5,
            generation_batch_size: 10,
            generation_concurrency: 3,
            quality_batch_size: 5,
            similarity_threshold: 0.85,
            call_timeout_secs: 30,
            document_timeout_secs: 900,
            timeout_failure_threshold: 6,
            reclaim_pause_ms: 50,
            inter_document_delay_ms: 2_000,
        }
    }
}

impl PipelineSettings {
    /// Fast preset: fewer chunks and shorter deadlines
    pub fn fast() -> Self {
        Self {
            max_chunks: 8,
            pre_classification_cap: 25,
            clause_cap: 25,
            metrics_cap: 15,
            call_timeout_secs: 15,
            document_timeout_secs: 300,
            reclaim_pause_ms: 0,
            inter_document_delay_ms: 500,
            ..Self::default()
        }
    }

    /// Thorough preset: more chunks, lower concurrency, longer deadlines
    pub fn thorough() -> Self {
        Self {
            max_chunks: 40,
            classification_concurrency: 3,
            generation_concurrency: 2,
            call_timeout_secs: 60,
            document_timeout_secs: 1_800,
            timeout_failure_threshold: 10,
            reclaim_pause_ms: 100,
            inter_document_delay_ms: 5_000,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

/// User filter applied after classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterRule {
    /// Keep everything
    #[default]
    All,
    /// Clauses labelled Critical
    CriticalOnly,
    /// Clauses labelled Critical or Important
    ImportantPlus,
    /// Metric sets with at least one field carrying this label
    MetricLabel(String),
}

impl FilterRule {
    /// Parse a `classFilter` value
    pub fn parse_class_filter(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(FilterRule::All),
            "critical_only" | "critical-only" | "critical" => Some(FilterRule::CriticalOnly),
            "important_plus" | "important-plus" | "important" => Some(FilterRule::ImportantPlus),
            _ => None,
        }
    }

    /// Parse a `metricFilter` value; any label other than `all` is a target
    pub fn parse_metric_filter(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            FilterRule::All
        } else {
            FilterRule::MetricLabel(trimmed.to_string())
        }
    }
}

/// Immutable description of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    /// Which pipeline to run
    pub pipeline_type: PipelineType,
    /// Encoding of the output artifact
    pub output_format: OutputFormat,
    /// Post-classification filter
    pub filter: FilterRule,
    /// Sort by priority before capping
    pub prioritize: bool,
    /// Ask the projector model for metric projections
    pub generate_projections: bool,
    /// House style passed to extraction and generation prompts
    pub style_sample: Option<String>,
    /// Limits and tuning
    pub settings: PipelineSettings,
    /// Model per role
    pub models: ModelRegistry,
}

impl PipelineConfiguration {
    /// Configuration with default settings for `pipeline_type`
    pub fn new(pipeline_type: PipelineType) -> Self {
        Self {
            pipeline_type,
            output_format: OutputFormat::Jsonl,
            filter: FilterRule::All,
            prioritize: true,
            generate_projections: false,
            style_sample: None,
            settings: PipelineSettings::default(),
            models: ModelRegistry::default(),
        }
    }

    /// Set the output format
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the filter rule
    pub fn with_filter(mut self, filter: FilterRule) -> Self {
        self.filter = filter;
        self
    }

    /// Enable or disable priority sorting
    pub fn with_prioritize(mut self, prioritize: bool) -> Self {
        self.prioritize = prioritize;
        self
    }

    /// Enable or disable metric projections
    pub fn with_projections(mut self, enabled: bool) -> Self {
        self.generate_projections = enabled;
        self
    }

    /// Set the organisation style sample
    pub fn with_style_sample(mut self, sample: impl Into<String>) -> Self {
        let sample = sample.into();
        self.style_sample = (!sample.trim().is_empty()).then_some(sample);
        self
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the model registry
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Item flavor of the configured pipeline
    pub fn flavor(&self) -> Flavor {
        self.pipeline_type.flavor()
    }

    /// Check the settings
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.settings.validate().map_err(PipelineError::Config)
    }
}

/// Invocation contract for one document
///
/// Deserialized from camelCase JSON request bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Object key of the extracted raw text
    pub text_key: String,
    /// `legal`, `qa` or `finance`
    pub pipeline_type: PipelineType,
    /// Output encoding
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
    /// Clause filter (`all`, `critical_only`, `important_plus`)
    #[serde(default)]
    pub class_filter: Option<String>,
    /// Metric label filter (`all` or a label)
    #[serde(default)]
    pub metric_filter: Option<String>,
    /// Sort clauses by priority before capping
    #[serde(default = "default_true")]
    pub prioritize_important: bool,
    /// Attach projections to metric sets
    #[serde(default)]
    pub generate_projections: bool,
    /// Override for the maximum chunk length
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Override for the chunk overlap
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    /// House style sample
    #[serde(default)]
    pub org_style_sample: Option<String>,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Jsonl
}

fn default_true() -> bool {
    true
}

impl PipelineRequest {
    /// Minimal request for `text_key`
    pub fn new(text_key: impl Into<String>, pipeline_type: PipelineType) -> Self {
        Self {
            text_key: text_key.into(),
            pipeline_type,
            output_format: default_output_format(),
            class_filter: None,
            metric_filter: None,
            prioritize_important: true,
            generate_projections: false,
            chunk_size: None,
            chunk_overlap: None,
            org_style_sample: None,
        }
    }

    /// Build the run configuration from this request and base settings
    pub fn into_configuration(
        self,
        mut settings: PipelineSettings,
        models: ModelRegistry,
    ) -> Result<PipelineConfiguration, PipelineError> {
        if self.text_key.trim().is_empty() {
            return Err(PipelineError::Config("textKey is required".to_string()));
        }

        // A clause filter on a metrics run (and vice versa) is accepted here;
        // the filter stage falls back when the rule does not fit the flavor.
        let filter = match (&self.metric_filter, &self.class_filter) {
            (Some(metric), _) if self.pipeline_type.flavor() == Flavor::Metrics => {
                FilterRule::parse_metric_filter(metric)
            }
            (_, Some(class)) => FilterRule::parse_class_filter(class).ok_or_else(|| {
                PipelineError::Config(format!("Unknown classFilter '{}'", class))
            })?,
            (Some(metric), None) => FilterRule::parse_metric_filter(metric),
            (None, None) => FilterRule::All,
        };

        if let Some(size) = self.chunk_size {
            settings.chunk_max_length = size;
            settings.chunk_min_length = settings.chunk_min_length.min(size / 2).max(1);
        }
        if let Some(overlap) = self.chunk_overlap {
            settings.chunk_overlap = overlap;
        }

        let mut configuration = PipelineConfiguration::new(self.pipeline_type)
            .with_output_format(self.output_format)
            .with_filter(filter)
            .with_prioritize(self.prioritize_important)
            .with_projections(self.generate_projections)
            .with_settings(settings)
            .with_models(models);
        if let Some(sample) = self.org_style_sample {
            configuration = configuration.with_style_sample(sample);
        }
        configuration.validate()?;
        Ok(configuration)
    }
}
