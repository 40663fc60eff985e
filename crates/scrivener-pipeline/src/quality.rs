//! Quality stage - evaluate variants and drop weak ones
//!
//! The evaluator model judges each variant. When that call fails the stage
//! falls back to word-set Jaccard similarity against the original.

use crate::calls::{run_in_groups, Abandoned, GroupSizes, StageContext};
use crate::error::CallFailure;
use crate::governor::truncate_chars;
use crate::parser::{parse_evaluations, Evaluation};
use scrivener_domain::{
    AssessedVariantSet, ChatProvider, ChatRequest, ModelRole, QualityMetrics, Stage, VariantSet,
};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Lower-cased word set of `text`
pub fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity of two word sets; 0.0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Batched quality assessor
pub struct QualityAssessor<P> {
    ctx: StageContext<P>,
}

impl<P: ChatProvider + 'static> QualityAssessor<P> {
    /// Create an assessor for one run
    pub fn new(ctx: StageContext<P>) -> Self {
        Self { ctx }
    }

    /// Assess every variant set, batch by batch
    pub async fn assess(&self, sets: Vec<VariantSet>) -> Vec<AssessedVariantSet> {
        let batch = self.ctx.config.settings.quality_batch_size;
        let task_ctx = self.ctx.clone();
        let reporter = self.ctx.reporter.clone();

        let assessed = run_in_groups(
            sets,
            GroupSizes::new(batch, batch),
            &self.ctx.governor,
            || self.ctx.timeout_limit_reached(),
            move |set| {
                let ctx = task_ctx.clone();
                async move { assess_one(&ctx, set).await }
            },
            |set, why| {
                if why == Abandoned::Aborted {
                    self.ctx
                        .reporter
                        .warn(Stage::QualityFiltering, "Evaluation task aborted; variants kept unfiltered");
                }
                pass_through(set, true)
            },
            |done, total| {
                reporter.report(
                    Stage::QualityFiltering,
                    Stage::QualityFiltering.progress_at(done, total),
                    format!("Assessed {}/{} items", done, total),
                )
            },
        )
        .await;

        let kept: usize = assessed.iter().map(|a| a.set.variants.len()).sum();
        let dropped: usize = assessed.iter().map(|a| a.quality_metrics.filtered_count).sum();
        info!("Quality filter kept {} variants, dropped {}", kept, dropped);
        assessed
    }
}

async fn assess_one<P: ChatProvider>(ctx: &StageContext<P>, set: VariantSet) -> AssessedVariantSet {
    if set.variants.is_empty() {
        return pass_through(set, false);
    }

    let original = set.original.text();
    match request_evaluations(ctx, &original, &set.variants).await {
        Ok(evaluations) => apply_evaluations(set, evaluations),
        Err(failure) => {
            ctx.soft_failure(Stage::QualityFiltering, "Evaluation", &failure);
            jaccard_fallback(set, &original, ctx.config.settings.similarity_threshold)
        }
    }
}

async fn request_evaluations<P: ChatProvider>(
    ctx: &StageContext<P>,
    original: &str,
    variants: &[String],
) -> Result<Vec<Evaluation>, CallFailure> {
    let input = ctx.prompts.evaluation_input(original, variants);
    let request = ChatRequest::new(ctx.model(ModelRole::Evaluator))
        .system(ctx.prompts.evaluation())
        .user(truncate_chars(&input, ctx.config.settings.max_call_chars))
        .temperature(0.0)
        .max_tokens(1000)
        .json();
    let response = ctx.caller.call(request).await?;
    let evaluations = parse_evaluations(&response).map_err(CallFailure::parse)?;
    if !evaluations.iter().any(|e| e.index < variants.len()) {
        return Err(CallFailure::parse(format!(
            "No evaluation refers to any of the {} variants",
            variants.len()
        )));
    }
    Ok(evaluations)
}

/// Keep variants the evaluator marked `should_keep`
pub fn apply_evaluations(mut set: VariantSet, evaluations: Vec<Evaluation>) -> AssessedVariantSet {
    let total = set.variants.len();
    let mut by_index: HashMap<usize, Evaluation> = HashMap::with_capacity(evaluations.len());
    for evaluation in evaluations {
        by_index.entry(evaluation.index).or_insert(evaluation);
    }

    let mut similarity = 0.0;
    let mut legal = 0.0;
    let mut kept = Vec::with_capacity(total);
    for (index, variant) in std::mem::take(&mut set.variants).into_iter().enumerate() {
        if let Some(evaluation) = by_index.get(&index).filter(|e| e.should_keep) {
            similarity += evaluation.similarity_score;
            legal += evaluation.legal_score;
            kept.push(variant);
        }
    }

    let metrics = QualityMetrics {
        filtered_count: total - kept.len(),
        avg_similarity: mean(similarity, kept.len()),
        avg_legal_score: mean(legal, kept.len()),
        total_variants: total,
        fallback_method: false,
        evaluation_failed: false,
    };
    set.variants = kept;
    AssessedVariantSet {
        set,
        quality_metrics: metrics,
    }
}

/// Keep variants whose Jaccard similarity to `original` is below `threshold`
pub fn jaccard_fallback(mut set: VariantSet, original: &str, threshold: f64) -> AssessedVariantSet {
    let original_words = word_set(original);
    if original_words.is_empty() {
        return pass_through(set, true);
    }

    let total = set.variants.len();
    let mut similarity = 0.0;
    let mut kept = Vec::with_capacity(total);
    for variant in std::mem::take(&mut set.variants) {
        let score = jaccard(&original_words, &word_set(&variant));
        if score < threshold {
            similarity += score;
            kept.push(variant);
        }
    }

    let metrics = QualityMetrics {
        filtered_count: total - kept.len(),
        avg_similarity: mean(similarity, kept.len()),
        avg_legal_score: 0.0,
        total_variants: total,
        fallback_method: true,
        evaluation_failed: false,
    };
    set.variants = kept;
    AssessedVariantSet {
        set,
        quality_metrics: metrics,
    }
}

fn pass_through(set: VariantSet, evaluation_failed: bool) -> AssessedVariantSet {
    let metrics = QualityMetrics {
        total_variants: set.variants.len(),
        evaluation_failed,
        ..QualityMetrics::default()
    };
    AssessedVariantSet {
        set,
        quality_metrics: metrics,
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
