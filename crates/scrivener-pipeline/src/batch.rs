//! Sequential multi-document processing

use crate::config::PipelineConfiguration;
use crate::job::{run_with_deadline, settle_forwarder, RunOutcome};
use crate::progress::ProgressReporter;
use crate::types::{ErrorRecord, PipelineResult};
use scrivener_domain::{ChatProvider, ProgressEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// One document to process
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Display name, usually the file name
    pub name: String,
    /// Document text
    pub text: String,
}

impl DocumentInput {
    /// Create an input
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Result of one document in a batch
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    /// Document name
    pub name: String,
    /// Pipeline result or error record
    pub result: Result<PipelineResult, ErrorRecord>,
}

/// Progress event tagged with its document
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    /// Position of the document in the batch
    pub document: usize,
    /// Document name
    pub name: String,
    /// The progress event
    pub event: ProgressEvent,
}

/// Runs documents one at a time with a pause between them
pub struct BatchRunner<P> {
    provider: Arc<P>,
}

impl<P: ChatProvider + 'static> BatchRunner<P> {
    /// Create a batch runner
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Process `documents` in order
    ///
    /// A failing document does not stop the batch.
    pub async fn run(
        &self,
        config: &PipelineConfiguration,
        documents: Vec<DocumentInput>,
        events: Option<mpsc::UnboundedSender<DocumentEvent>>,
    ) -> Vec<DocumentOutcome> {
        let total = documents.len();
        let delay = config.settings.inter_document_delay();
        let mut outcomes = Vec::with_capacity(total);

        for (index, document) in documents.into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            info!("Processing document {}/{}: {}", index + 1, total, document.name);

            let (reporter, mut progress) = ProgressReporter::channel();
            let sink = events.clone();
            let name = document.name.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = progress.recv().await {
                    if let Some(sink) = &sink {
                        let tagged = DocumentEvent {
                            document: index,
                            name: name.clone(),
                            event,
                        };
                        if sink.send(tagged).is_err() {
                            break;
                        }
                    }
                }
            });

            let outcome =
                run_with_deadline(Arc::clone(&self.provider), config.clone(), document.text, reporter).await;
            settle_forwarder(forwarder, &outcome).await;

            let result = match outcome {
                RunOutcome::Completed(result) => Ok(result),
                RunOutcome::Failed(e) => Err(ErrorRecord::from(&e)),
                RunOutcome::TimedOut(limit) => Err(ErrorRecord::timed_out(limit)),
            };
            outcomes.push(DocumentOutcome {
                name: document.name,
                result,
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!("Batch complete: {}/{} documents succeeded", succeeded, total);
        outcomes
    }
}
