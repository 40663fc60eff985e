//! Pipeline orchestration - runs the stages in order for one document

use crate::calls::StageContext;
use crate::chunking::TextChunker;
use crate::classifier::Classifier;
use crate::config::PipelineConfiguration;
use crate::dedup::Deduplicator;
use crate::error::PipelineError;
use crate::extractor::Extractor;
use crate::filter::ItemFilter;
use crate::formatter::Formatter;
use crate::generator::Generator;
use crate::governor::truncate_chars;
use crate::progress::ProgressReporter;
use crate::quality::QualityAssessor;
use crate::types::{PipelineResult, PipelineStats};
use scrivener_domain::{ChatProvider, Stage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs one configuration against a chat provider
///
/// # Examples
///
/// ```
/// use scrivener_pipeline::{Pipeline, PipelineConfiguration, ProgressReporter};
/// use scrivener_domain::PipelineType;
/// use scrivener_llm::MockProvider;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = Arc::new(MockProvider::new("Standard"));
/// let pipeline = Pipeline::new(provider, PipelineConfiguration::new(PipelineType::Legal)).unwrap();
/// let result = pipeline.process("   ", ProgressReporter::silent()).await;
/// assert!(result.is_err());
/// # }
/// ```
pub struct Pipeline<P> {
    provider: Arc<P>,
    config: Arc<PipelineConfiguration>,
}

impl<P> Clone for Pipeline<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: Arc::clone(&self.config),
        }
    }
}

impl<P: ChatProvider + 'static> Pipeline<P> {
    /// Create a pipeline, validating the configuration
    pub fn new(provider: Arc<P>, config: PipelineConfiguration) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            provider,
            config: Arc::new(config),
        })
    }

    /// Configuration of this pipeline
    pub fn configuration(&self) -> &PipelineConfiguration {
        &self.config
    }

    /// Process one document
    ///
    /// Soft failures are counted in the returned statistics; only
    /// catastrophic conditions return an error.
    pub async fn process(
        &self,
        text: &str,
        reporter: ProgressReporter,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let config = &self.config;
        let settings = &config.settings;
        let ctx = StageContext::new(Arc::clone(&self.provider), Arc::clone(config), reporter.clone());
        let mut stats = PipelineStats {
            pipeline_type: Some(config.pipeline_type),
            ..PipelineStats::default()
        };

        // Chunking
        let mut stage_started = Instant::now();
        reporter.report(Stage::Chunking, 0, "Preparing document");
        stats.input_chars = text.chars().count();
        let text = truncate_chars(text, settings.max_text_length);
        stats.processed_chars = text.chars().count();
        stats.truncated = stats.processed_chars < stats.input_chars;
        if text.trim().is_empty() {
            error!("Input text is empty");
            return Err(PipelineError::EmptyInput);
        }
        if stats.truncated {
            info!("Truncated input from {} to {} characters", stats.input_chars, stats.processed_chars);
            reporter.report(
                Stage::Chunking,
                2,
                format!(
                    "Truncated input from {} to {} characters",
                    stats.input_chars, stats.processed_chars
                ),
            );
        }
        let chunks = TextChunker::from_settings(settings).chunk(text);
        if chunks.is_empty() {
            error!("No chunks produced from {} characters", stats.processed_chars);
            return Err(PipelineError::Chunking(stats.processed_chars));
        }
        stats.chunks = chunks.len();
        reporter.report(Stage::Chunking, 10, format!("Created {} chunks", chunks.len()));
        ctx.governor.reclaim().await;
        stage_done(&mut stats, Stage::Chunking, &mut stage_started);

        // Extraction
        reporter.report(Stage::Extraction, 10, format!("Extracting from {} chunks", chunks.len()));
        let items = Extractor::new(ctx.clone()).extract(chunks).await;
        self.check_timeouts(&ctx)?;
        stats.extracted = items.len();
        ctx.governor.reclaim().await;
        stage_done(&mut stats, Stage::Extraction, &mut stage_started);

        // Deduplication
        let outcome = Deduplicator::dedup(items);
        if outcome.used_fallback {
            reporter.warn(
                Stage::Deduplication,
                "Normalized keys unavailable; used exact-match deduplication",
            );
        }
        stats.deduplicated = outcome.items.len();
        stats.dedup_fallback = outcome.used_fallback;
        reporter.report(
            Stage::Deduplication,
            40,
            format!("{} unique items from {} extracted", stats.deduplicated, stats.extracted),
        );
        let items = ctx.governor.cap(
            outcome.items,
            settings.pre_classification_cap,
            "items before classification",
        );
        ctx.governor.reclaim().await;
        stage_done(&mut stats, Stage::Deduplication, &mut stage_started);

        // Classification
        reporter.report(Stage::Classification, 40, format!("Classifying {} items", items.len()));
        let classified = Classifier::new(ctx.clone()).classify(items).await;
        self.check_timeouts(&ctx)?;
        stats.classified = classified.len();
        reporter.report(Stage::Classification, 60, format!("Classified {} items", stats.classified));
        stage_done(&mut stats, Stage::Classification, &mut stage_started);

        // Filtering
        let outcome = ItemFilter::from_configuration(config).apply(classified);
        if let Some(reason) = &outcome.error {
            reporter.warn(
                Stage::Filtering,
                format!("Filter not applied ({}); kept first {} items", reason, outcome.items.len()),
            );
        }
        stats.filtered = outcome.items.len();
        stats.filter_fallback = outcome.used_fallback();
        reporter.report(Stage::Filtering, 65, format!("Kept {} items after filtering", stats.filtered));
        ctx.governor.reclaim().await;
        stage_done(&mut stats, Stage::Filtering, &mut stage_started);

        // Generation
        reporter.report(Stage::Generation, 65, format!("Generating variants for {} items", stats.filtered));
        let sets = Generator::new(ctx.clone()).generate(outcome.items).await;
        self.check_timeouts(&ctx)?;
        stats.variants_generated = sets.iter().map(|s| s.variants.len()).sum();
        reporter.report(
            Stage::Generation,
            85,
            format!("Generated {} variants", stats.variants_generated),
        );
        stage_done(&mut stats, Stage::Generation, &mut stage_started);

        // Quality filtering
        reporter.report(Stage::QualityFiltering, 85, "Assessing variant quality");
        let assessed = QualityAssessor::new(ctx.clone()).assess(sets).await;
        self.check_timeouts(&ctx)?;
        stats.variants_kept = assessed.iter().map(|a| a.set.variants.len()).sum();
        reporter.report(
            Stage::QualityFiltering,
            95,
            format!("Kept {} of {} variants", stats.variants_kept, stats.variants_generated),
        );
        stage_done(&mut stats, Stage::QualityFiltering, &mut stage_started);

        // Formatting
        reporter.report(
            Stage::Formatting,
            95,
            format!("Formatting as {}", config.output_format.as_str()),
        );
        let output = Formatter::new(config.output_format, config.pipeline_type).format(&assessed);
        drop(assessed);
        stage_done(&mut stats, Stage::Formatting, &mut stage_started);

        stats.failures = ctx.tally.snapshot();
        stats.warnings = reporter.warning_count();
        stats.reclaim_requests = ctx.governor.reclaim_count();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        reporter.report(Stage::Formatting, 100, "Pipeline complete");
        info!(
            pipeline_type = config.pipeline_type.as_str(),
            chunks = stats.chunks,
            items = stats.filtered,
            variants = stats.variants_kept,
            failures = stats.failures.total(),
            duration_ms = stats.duration_ms,
            "Pipeline complete"
        );

        Ok(PipelineResult {
            success: true,
            stats,
            output,
            format: config.output_format,
            output_key: None,
        })
    }

    fn check_timeouts(&self, ctx: &StageContext<P>) -> Result<(), PipelineError> {
        let count = ctx.tally.timeouts();
        let threshold = self.config.settings.timeout_failure_threshold;
        if count >= threshold {
            error!("Aborting run: {} model calls timed out (threshold {})", count, threshold);
            return Err(PipelineError::TooManyTimeouts { count, threshold });
        }
        Ok(())
    }
}

fn stage_done(stats: &mut PipelineStats, stage: Stage, started: &mut Instant) {
    stats
        .stage_durations_ms
        .insert(stage, started.elapsed().as_millis() as u64);
    *started = Instant::now();
}
