//! Extraction stage - pull clauses or metric sets out of chunks

use crate::calls::StageContext;
use crate::error::CallFailure;
use crate::governor::truncate_chars;
use crate::parser::parse_metric_sets;
use crate::sentence::sentences_from_lines;
use scrivener_domain::{ChatProvider, ChatRequest, Flavor, Item, ModelRole, Stage};
use tracing::{debug, info, warn};

/// Sequential extractor, one model call per chunk
pub struct Extractor<P> {
    ctx: StageContext<P>,
}

impl<P: ChatProvider> Extractor<P> {
    /// Create an extractor for one run
    pub fn new(ctx: StageContext<P>) -> Self {
        Self { ctx }
    }

    /// Extract items from every chunk, skipping chunks whose call fails
    pub async fn extract(&self, chunks: Vec<String>) -> Vec<Item> {
        let total = chunks.len();
        let mut items = Vec::new();

        for (idx, chunk) in chunks.into_iter().enumerate() {
            if self.ctx.timeout_limit_reached() {
                warn!("Timeout threshold reached; skipping remaining {} chunks", total - idx);
                break;
            }

            match self.extract_chunk(&chunk).await {
                Ok(found) => {
                    debug!("Chunk {}/{} yielded {} items", idx + 1, total, found.len());
                    items.extend(found);
                }
                Err(failure) => {
                    self.ctx
                        .soft_failure(Stage::Extraction, &format!("Chunk {}", idx + 1), &failure);
                }
            }

            self.ctx.reporter.report(
                Stage::Extraction,
                Stage::Extraction.progress_at(idx + 1, total),
                format!("Processed chunk {}/{} ({} items so far)", idx + 1, total, items.len()),
            );
            self.ctx.governor.reclaim().await;
        }

        info!("Extracted {} items from {} chunks", items.len(), total);
        items
    }

    async fn extract_chunk(&self, chunk: &str) -> Result<Vec<Item>, CallFailure> {
        let settings = &self.ctx.config.settings;
        let request = ChatRequest::new(self.ctx.model(ModelRole::Extractor))
            .system(self.ctx.prompts.extraction())
            .user(truncate_chars(chunk, settings.max_call_chars))
            .temperature(0.1)
            .max_tokens(2000);

        match self.ctx.config.flavor() {
            Flavor::Clause => {
                let response = self.ctx.caller.call(request).await?;
                Ok(sentences_from_lines(&response, 1, settings.max_item_length)
                    .into_iter()
                    .map(|text| Item::Clause {
                        text,
                        source_text: Some(chunk.to_string()),
                    })
                    .collect())
            }
            Flavor::Metrics => {
                let response = self.ctx.caller.call(request.json()).await?;
                let sets = parse_metric_sets(&response).map_err(CallFailure::parse)?;
                Ok(sets
                    .into_iter()
                    .map(|set| Item::Metrics {
                        set,
                        source_text: Some(chunk.to_string()),
                    })
                    .collect())
            }
        }
    }
}
