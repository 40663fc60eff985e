//! Generation stage - rewrite items into variants

use crate::calls::{run_in_groups, Abandoned, GroupSizes, StageContext};
use crate::error::CallFailure;
use crate::governor::truncate_chars;
use crate::parser::parse_projection;
use crate::sentence::sentences_from_lines;
use scrivener_domain::{
    ChatProvider, ChatRequest, ClassifiedItem, Item, MetricSet, ModelRole, Stage, VariantSet,
    MAX_VARIANTS,
};
use serde_json::Value;
use tracing::info;

/// Batched, bounded-concurrency variant generator
pub struct Generator<P> {
    ctx: StageContext<P>,
}

impl<P: ChatProvider + 'static> Generator<P> {
    /// Create a generator for one run
    pub fn new(ctx: StageContext<P>) -> Self {
        Self { ctx }
    }

    /// Produce a variant set per item; failures yield an empty variant list
    pub async fn generate(&self, items: Vec<ClassifiedItem>) -> Vec<VariantSet> {
        let settings = &self.ctx.config.settings;
        let task_ctx = self.ctx.clone();
        let reporter = self.ctx.reporter.clone();

        let sets = run_in_groups(
            items,
            GroupSizes::new(settings.generation_batch_size, settings.generation_concurrency),
            &self.ctx.governor,
            || self.ctx.timeout_limit_reached(),
            move |item| {
                let ctx = task_ctx.clone();
                async move { generate_one(&ctx, item).await }
            },
            |item, why| {
                if why == Abandoned::Aborted {
                    self.ctx
                        .reporter
                        .warn(Stage::Generation, "Generation task aborted; no variants");
                }
                VariantSet::empty(item)
            },
            |done, total| {
                reporter.report(
                    Stage::Generation,
                    Stage::Generation.progress_at(done, total),
                    format!("Generated variants for {}/{} items", done, total),
                )
            },
        )
        .await;

        let variants: usize = sets.iter().map(|s| s.variants.len()).sum();
        info!("Generated {} variants for {} items", variants, sets.len());
        sets
    }
}

async fn generate_one<P: ChatProvider>(ctx: &StageContext<P>, classified: ClassifiedItem) -> VariantSet {
    let variants = match request_variants(ctx, &classified.item.text()).await {
        Ok(variants) => variants,
        Err(failure) => {
            ctx.soft_failure(Stage::Generation, "Variant generation", &failure);
            Vec::new()
        }
    };

    let projection = match &classified.item {
        Item::Metrics { set, .. } if ctx.config.generate_projections => {
            match request_projection(ctx, set).await {
                Ok(projection) => Some(projection),
                Err(failure) => {
                    ctx.soft_failure(Stage::Generation, "Projection", &failure);
                    None
                }
            }
        }
        _ => None,
    };

    VariantSet {
        original: classified.item,
        classification: classified.classification,
        variants,
        projection,
    }
}

async fn request_variants<P: ChatProvider>(
    ctx: &StageContext<P>,
    text: &str,
) -> Result<Vec<String>, CallFailure> {
    let settings = &ctx.config.settings;
    let request = ChatRequest::new(ctx.model(ModelRole::Generator))
        .system(ctx.prompts.generation())
        .user(truncate_chars(text, settings.max_call_chars))
        .temperature(0.7)
        .max_tokens(800);
    let response = ctx.caller.call(request).await?;

    let mut variants: Vec<String> = Vec::with_capacity(MAX_VARIANTS);
    for sentence in sentences_from_lines(&response, settings.min_variant_length, settings.max_item_length) {
        if variants.len() == MAX_VARIANTS {
            break;
        }
        if !variants.contains(&sentence) {
            variants.push(sentence);
        }
    }
    Ok(variants)
}

async fn request_projection<P: ChatProvider>(
    ctx: &StageContext<P>,
    set: &MetricSet,
) -> Result<Value, CallFailure> {
    let payload = serde_json::to_string(set).map_err(|e| CallFailure::parse(e.to_string()))?;
    let request = ChatRequest::new(ctx.model(ModelRole::Projector))
        .system(ctx.prompts.projection())
        .user(payload)
        .temperature(0.2)
        .max_tokens(600)
        .json();
    let response = ctx.caller.call(request).await?;
    parse_projection(&response).map_err(CallFailure::parse)
}
