//! Classification stage - label items by importance

use crate::calls::{run_in_groups, Abandoned, GroupSizes, StageContext};
use crate::error::CallFailure;
use crate::governor::truncate_chars;
use crate::parser::{parse_clause_label, parse_metric_labels};
use scrivener_domain::{
    ChatProvider, ChatRequest, Classification, ClassifiedItem, ClauseLabel, Item, ModelRole, Stage,
};
use std::collections::BTreeMap;
use tracing::info;

/// Label assigned when classification fails
pub fn default_classification(item: &Item) -> Classification {
    match item {
        Item::Clause { .. } => Classification::Clause(ClauseLabel::default()),
        Item::Metrics { .. } => Classification::Metrics(BTreeMap::new()),
    }
}

/// Batched, bounded-concurrency classifier
pub struct Classifier<P> {
    ctx: StageContext<P>,
}

impl<P: ChatProvider + 'static> Classifier<P> {
    /// Create a classifier for one run
    pub fn new(ctx: StageContext<P>) -> Self {
        Self { ctx }
    }

    /// Classify every item; failures get the default label
    pub async fn classify(&self, items: Vec<Item>) -> Vec<ClassifiedItem> {
        let settings = &self.ctx.config.settings;
        let task_ctx = self.ctx.clone();
        let reporter = self.ctx.reporter.clone();

        let classified = run_in_groups(
            items,
            GroupSizes::new(
                settings.classification_batch_size,
                settings.classification_concurrency,
            ),
            &self.ctx.governor,
            || self.ctx.timeout_limit_reached(),
            move |item| {
                let ctx = task_ctx.clone();
                async move { classify_one(&ctx, item).await }
            },
            |item, why| {
                if why == Abandoned::Aborted {
                    self.ctx
                        .reporter
                        .warn(Stage::Classification, "Classification task aborted; using default label");
                }
                ClassifiedItem {
                    classification: default_classification(&item),
                    item,
                }
            },
            |done, total| {
                reporter.report(
                    Stage::Classification,
                    Stage::Classification.progress_at(done, total),
                    format!("Classified {}/{} items", done, total),
                )
            },
        )
        .await;

        info!("Classified {} items", classified.len());
        classified
    }
}

async fn classify_one<P: ChatProvider>(ctx: &StageContext<P>, item: Item) -> ClassifiedItem {
    match request_classification(ctx, &item).await {
        Ok(classification) => ClassifiedItem {
            item,
            classification,
        },
        Err(failure) => {
            ctx.soft_failure(Stage::Classification, "Classification", &failure);
            ClassifiedItem {
                classification: default_classification(&item),
                item,
            }
        }
    }
}

async fn request_classification<P: ChatProvider>(
    ctx: &StageContext<P>,
    item: &Item,
) -> Result<Classification, CallFailure> {
    let max_chars = ctx.config.settings.max_call_chars;
    let request = ChatRequest::new(ctx.model(ModelRole::Classifier))
        .system(ctx.prompts.classification())
        .temperature(0.0);

    match item {
        Item::Clause { text, .. } => {
            let request = request.user(truncate_chars(text, max_chars)).max_tokens(50);
            let response = ctx.caller.call(request).await?;
            parse_clause_label(&response)
                .map(Classification::Clause)
                .map_err(CallFailure::parse)
        }
        Item::Metrics { set, .. } => {
            let payload =
                serde_json::to_string(set).map_err(|e| CallFailure::parse(e.to_string()))?;
            let request = request
                .user(truncate_chars(&payload, max_chars))
                .max_tokens(800)
                .json();
            let response = ctx.caller.call(request).await?;
            parse_metric_labels(&response)
                .map(Classification::Metrics)
                .map_err(CallFailure::parse)
        }
    }
}
