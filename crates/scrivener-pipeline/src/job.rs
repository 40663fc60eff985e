//! Job runner - submit, run, poll and stream pipeline invocations
//!
//! A job reads its input from the object store, runs the pipeline under the
//! document deadline, writes the encoded dataset back to the object store and
//! records a terminal status in the job store.

use crate::config::PipelineConfiguration;
use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::progress::ProgressReporter;
use crate::types::{ErrorRecord, PipelineResult, StreamRecord};
use scrivener_domain::{ChatProvider, JobId, JobRecord, JobStatus, JobStore, ObjectStore, ProgressEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How one document run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline returned a result
    Completed(PipelineResult),
    /// The pipeline aborted
    Failed(PipelineError),
    /// The document deadline passed first
    TimedOut(Duration),
}

/// Run `text` through a pipeline, waiting at most the document timeout
///
/// On timeout the run task is detached, not cancelled.
pub(crate) async fn run_with_deadline<P: ChatProvider + 'static>(
    provider: Arc<P>,
    config: PipelineConfiguration,
    text: String,
    reporter: ProgressReporter,
) -> RunOutcome {
    let limit = config.settings.document_timeout();
    let pipeline = match Pipeline::new(provider, config) {
        Ok(pipeline) => pipeline,
        Err(e) => return RunOutcome::Failed(e),
    };

    let handle = tokio::spawn(async move { pipeline.process(&text, reporter).await });
    match tokio::time::timeout(limit, handle).await {
        Err(_) => {
            warn!("Document exceeded {}s deadline; detaching run", limit.as_secs());
            RunOutcome::TimedOut(limit)
        }
        Ok(Err(join_error)) => RunOutcome::Failed(PipelineError::Aborted(join_error.to_string())),
        Ok(Ok(Err(e))) => RunOutcome::Failed(e),
        Ok(Ok(Ok(result))) => RunOutcome::Completed(result),
    }
}

/// Wait for a progress forwarder, or drop it if the run was detached
pub(crate) async fn settle_forwarder(forwarder: JoinHandle<()>, outcome: &RunOutcome) {
    if matches!(outcome, RunOutcome::TimedOut(_)) {
        forwarder.abort();
    } else if let Err(e) = forwarder.await {
        debug!("Progress forwarder ended abnormally: {}", e);
    }
}

/// Runs pipelines as tracked jobs
pub struct JobRunner<P, O, J> {
    provider: Arc<P>,
    objects: Arc<O>,
    jobs: Arc<J>,
}

impl<P, O, J> Clone for JobRunner<P, O, J> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            objects: Arc::clone(&self.objects),
            jobs: Arc::clone(&self.jobs),
        }
    }
}

impl<P, O, J> JobRunner<P, O, J>
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    /// Create a runner over the given collaborators
    pub fn new(provider: Arc<P>, objects: Arc<O>, jobs: Arc<J>) -> Self {
        Self {
            provider,
            objects,
            jobs,
        }
    }

    /// Object store used for inputs and outputs
    pub fn objects(&self) -> &O {
        &self.objects
    }

    /// Insert a queued record and return its id
    pub fn submit(&self) -> Result<JobId, PipelineError> {
        let id = JobId::new();
        self.jobs.insert(JobRecord::queued(id)).map_err(storage)?;
        info!("Queued job {}", id);
        Ok(id)
    }

    /// Current record for `id`
    pub fn status(&self, id: JobId) -> Result<Option<JobRecord>, PipelineError> {
        self.jobs.get(id).map_err(storage)
    }

    /// Submit a job and run it in the background
    pub fn spawn(&self, config: PipelineConfiguration, text_key: String) -> Result<JobId, PipelineError> {
        let id = self.submit()?;
        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(id, config, text_key).await {
                error!("Job {} could not be recorded: {}", id, e);
            }
        });
        Ok(id)
    }

    /// Run a submitted job to a terminal state
    pub async fn run(
        &self,
        id: JobId,
        config: PipelineConfiguration,
        text_key: String,
    ) -> Result<JobRecord, PipelineError> {
        self.jobs
            .update(id, |record| {
                if record.status.can_transition_to(JobStatus::Processing) {
                    record.status = JobStatus::Processing;
                    record.progress_message = "Starting pipeline".to_string();
                }
            })
            .map_err(storage)?
            .ok_or_else(|| PipelineError::Storage(format!("Job {} not found", id)))?;

        let (reporter, mut events) = ProgressReporter::channel();
        let jobs = Arc::clone(&self.jobs);
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = jobs.update(id, |record| apply_event(record, &event)) {
                    warn!("Failed to record progress for job {}: {}", id, e);
                }
            }
        });

        let outcome = self.execute(config, &text_key, reporter).await;
        settle_forwarder(forwarder, &outcome).await;
        self.finish(id, outcome)
    }

    /// Run a pipeline and send NDJSON records to `sink`
    ///
    /// Progress records are followed by exactly one result or error record.
    pub async fn stream(
        &self,
        config: PipelineConfiguration,
        text_key: String,
        sink: mpsc::Sender<StreamRecord>,
    ) {
        let (reporter, mut events) = ProgressReporter::channel();
        let progress_sink = sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if progress_sink.send(StreamRecord::Progress(event)).await.is_err() {
                    debug!("Stream client went away");
                    break;
                }
            }
        });

        let outcome = self.execute(config, &text_key, reporter).await;
        settle_forwarder(forwarder, &outcome).await;
        let record = match outcome {
            RunOutcome::Completed(result) => StreamRecord::Result(result),
            RunOutcome::Failed(e) => StreamRecord::Error(ErrorRecord::from(&e)),
            RunOutcome::TimedOut(limit) => StreamRecord::Error(ErrorRecord::timed_out(limit)),
        };
        if sink.send(record).await.is_err() {
            debug!("Stream client went away before the final record");
        }
    }

    async fn execute(
        &self,
        config: PipelineConfiguration,
        text_key: &str,
        reporter: ProgressReporter,
    ) -> RunOutcome {
        let bytes = match self.objects.get(text_key) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read input {}: {}", text_key, e);
                return RunOutcome::Failed(PipelineError::MissingInput(text_key.to_string()));
            }
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let pipeline_type = config.pipeline_type;
        let format = config.output_format;

        match run_with_deadline(Arc::clone(&self.provider), config, text, reporter).await {
            RunOutcome::Completed(mut result) => {
                let key = format!(
                    "output/{}_{}.{}",
                    pipeline_type.as_str(),
                    uuid::Uuid::now_v7(),
                    format.extension()
                );
                match self.objects.put(&key, result.output.as_bytes(), format.content_type()) {
                    Ok(stored) => {
                        info!("Wrote output to {}", stored);
                        result.output_key = Some(stored);
                        RunOutcome::Completed(result)
                    }
                    Err(e) => {
                        error!("Failed to write output {}: {}", key, e);
                        RunOutcome::Failed(PipelineError::Storage(e.to_string()))
                    }
                }
            }
            other => other,
        }
    }

    fn finish(&self, id: JobId, outcome: RunOutcome) -> Result<JobRecord, PipelineError> {
        let record = self
            .jobs
            .update(id, |record| match &outcome {
                RunOutcome::Completed(result) => {
                    let timeouts = result.stats.failures.timeouts;
                    record.status = if timeouts > 0 {
                        JobStatus::CompletedWithWarnings
                    } else {
                        JobStatus::Completed
                    };
                    record.progress = 100;
                    record.progress_message = "Pipeline complete".to_string();
                    record.output_key = result.output_key.clone();
                    record.timeouts = timeouts;
                }
                RunOutcome::Failed(e) => {
                    record.status = JobStatus::Failed;
                    record.error = Some(e.to_string());
                    record.progress_message = "Pipeline failed".to_string();
                    if let PipelineError::TooManyTimeouts { count, .. } = e {
                        record.timeouts = *count;
                    }
                }
                RunOutcome::TimedOut(limit) => {
                    record.status = JobStatus::TimedOut;
                    record.error = Some(ErrorRecord::timed_out(*limit).message);
                    record.progress_message = "Pipeline timed out".to_string();
                }
            })
            .map_err(storage)?
            .ok_or_else(|| PipelineError::Storage(format!("Job {} not found", id)))?;

        info!("Job {} finished as {}", id, record.status);
        Ok(record)
    }
}

fn apply_event(record: &mut JobRecord, event: &ProgressEvent) {
    if record.status.is_terminal() {
        return;
    }
    record.progress = record.progress.max(event.progress);
    record.stage = Some(event.stage);
    record.progress_message = event.message.clone();
}

fn storage(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::Stage;

    fn event(progress: u8, stage: Stage) -> ProgressEvent {
        ProgressEvent {
            stage,
            message: format!("at {}", progress),
            progress,
            timestamp: 0,
        }
    }

    #[test]
    fn test_apply_event_is_monotonic() {
        let mut record = JobRecord::queued(JobId::new());
        record.status = JobStatus::Processing;

        apply_event(&mut record, &event(40, Stage::Classification));
        apply_event(&mut record, &event(35, Stage::Extraction));
        assert_eq!(record.progress, 40);
        assert_eq!(record.stage, Some(Stage::Extraction));
    }

    #[test]
    fn test_apply_event_ignores_terminal_records() {
        let mut record = JobRecord::queued(JobId::new());
        record.status = JobStatus::TimedOut;
        apply_event(&mut record, &event(90, Stage::QualityFiltering));
        assert_eq!(record.progress, 0);
        assert_eq!(record.stage, None);
    }
}
