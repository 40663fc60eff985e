//! Integration tests for the pipeline, job runner and batch runner

#[cfg(test)]
mod tests {
    use crate::{
        BatchRunner, DocumentInput, FilterRule, JobRunner, Pipeline, PipelineConfiguration,
        PipelineError, ProgressReporter, StreamRecord,
    };
    use scrivener_domain::{
        ChatRequest, JobStatus, JobStore, ObjectStore, OutputFormat, PipelineType, ProgressEvent,
        Stage,
    };
    use scrivener_llm::{LlmError, MockProvider, ModelRegistry};
    use scrivener_store::{MemoryJobStore, MemoryObjectStore};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const CLAUSES: &str = "1. The Buyer shall pay within 30 days.\n2. The Seller may terminate on written notice.";
    const VARIANTS: &str = "1. Payment by the Buyer is due no later than thirty days.\n2. The Buyer must settle each invoice inside a month.";
    const EVALUATIONS: &str = r#"{"evaluations": [
        {"index": 0, "similarity_score": 0.5, "legal_score": 0.9, "should_keep": true, "reason": "clear"},
        {"index": 1, "similarity_score": 0.4, "legal_score": 0.8, "should_keep": true, "reason": "clear"}
    ]}"#;

    fn scripted() -> MockProvider {
        MockProvider::default()
            .with_model_response("extractor-model", CLAUSES)
            .with_model_response("classifier-model", "Critical")
            .with_model_response("generator-model", VARIANTS)
            .with_model_response("evaluator-model", EVALUATIONS)
    }

    fn config(pipeline_type: PipelineType) -> PipelineConfiguration {
        let mut config =
            PipelineConfiguration::new(pipeline_type).with_models(ModelRegistry::per_role());
        config.settings.reclaim_pause_ms = 0;
        config.settings.inter_document_delay_ms = 0;
        config
    }

    fn document(chars: usize) -> String {
        "The parties agree to the following terms. "
            .chars()
            .cycle()
            .take(chars)
            .collect()
    }

    async fn drain(mut events: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn test_full_legal_run() {
        let provider = Arc::new(scripted());
        let pipeline = Pipeline::new(Arc::clone(&provider), config(PipelineType::Legal)).unwrap();

        let result = pipeline
            .process("The Buyer shall pay within 30 days.", ProgressReporter::silent())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.format, OutputFormat::Jsonl);
        assert_eq!(result.stats.chunks, 1);
        assert_eq!(result.stats.deduplicated, 2);
        assert_eq!(result.stats.variants_generated, 4);
        assert_eq!(result.stats.variants_kept, 4);
        assert_eq!(result.stats.failures.total(), 0);
        assert_eq!(result.stats.stage_durations_ms.len(), Stage::ALL.len());

        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["original"], "The Buyer shall pay within 30 days.");
        assert_eq!(first["classification"], "Critical");
        assert_eq!(first["variants"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_input_truncated_before_chunking() {
        let pipeline = Pipeline::new(Arc::new(scripted()), config(PipelineType::Legal)).unwrap();
        let result = pipeline
            .process(&document(6000), ProgressReporter::silent())
            .await
            .unwrap();

        assert_eq!(result.stats.input_chars, 6000);
        assert_eq!(result.stats.processed_chars, 5000);
        assert!(result.stats.truncated);
        assert!(result.stats.chunks >= 4);
        // Every chunk yields the same two clauses
        assert_eq!(result.stats.deduplicated, 2);
    }

    #[tokio::test]
    async fn test_near_duplicate_clauses_collapse() {
        let provider = scripted().with_model_response(
            "extractor-model",
            "Pay within 30 days\npay within 30 days.\nPay within thirty days",
        );
        let pipeline = Pipeline::new(Arc::new(provider), config(PipelineType::Legal)).unwrap();
        let result = pipeline
            .process("Pay within 30 days.", ProgressReporter::silent())
            .await
            .unwrap();

        assert_eq!(result.stats.extracted, 3);
        assert_eq!(result.stats.deduplicated, 2);
    }

    #[tokio::test]
    async fn test_critical_only_keeps_critical_clauses() {
        let clauses: Vec<String> = (0..10).map(|i| format!("Clause number {} applies.", i)).collect();
        let listing = clauses.join("\n");
        let provider = MockProvider::from_fn(move |req: &ChatRequest| {
            let content = req.user_content().unwrap_or_default();
            match req.model.as_str() {
                "extractor-model" => Ok(listing.clone()),
                "classifier-model" => Ok(match content {
                    "Clause number 0 applies." | "Clause number 7 applies." => "Critical",
                    "Clause number 1 applies." | "Clause number 2 applies." | "Clause number 3 applies." => "Important",
                    _ => "Standard",
                }
                .to_string()),
                "generator-model" => Ok(VARIANTS.to_string()),
                _ => Ok(EVALUATIONS.to_string()),
            }
        });
        let config = config(PipelineType::Legal).with_filter(FilterRule::CriticalOnly);
        let pipeline = Pipeline::new(Arc::new(provider), config).unwrap();
        let result = pipeline
            .process("Ten clauses live here.", ProgressReporter::silent())
            .await
            .unwrap();

        assert_eq!(result.stats.classified, 10);
        assert_eq!(result.stats.filtered, 2);
        assert!(!result.stats.filter_fallback);
        for line in result.output.lines() {
            let record: Value = serde_json::from_str(line).unwrap();
            assert_eq!(record["classification"], "Critical");
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let pipeline = Pipeline::new(Arc::new(scripted()), config(PipelineType::Qa)).unwrap();
        let (reporter, events) = ProgressReporter::channel();
        let collector = tokio::spawn(drain(events));

        pipeline.process(&document(3000), reporter).await.unwrap();
        let events = collector.await.unwrap();

        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[0].progress <= pair[1].progress, "{:?}", pair);
        }
        let last = events.last().unwrap();
        assert_eq!(last.progress, 100);
        assert_eq!(last.stage, Stage::Formatting);
        for stage in Stage::ALL {
            assert!(events.iter().any(|e| e.stage == stage), "no event for {}", stage);
        }
    }

    #[tokio::test]
    async fn test_soft_failures_surface_as_warnings() {
        let provider = scripted().with_failure("The Seller may terminate on written notice.", scrivener_domain::FailureKind::Api);
        let pipeline = Pipeline::new(Arc::new(provider), config(PipelineType::Legal)).unwrap();
        let (reporter, events) = ProgressReporter::channel();
        let collector = tokio::spawn(drain(events));

        let result = pipeline.process("Two clauses.", reporter).await.unwrap();
        let events = collector.await.unwrap();

        // Classification and generation of the failing clause
        assert_eq!(result.stats.failures.api_errors, 2);
        assert_eq!(result.stats.classified, 2);
        assert!(result.stats.warnings >= 2);
        assert!(events.iter().filter(|e| e.is_warning()).count() >= 2);
    }

    #[tokio::test]
    async fn test_timeout_threshold_aborts_run() {
        let provider = MockProvider::from_fn(|req: &ChatRequest| match req.model.as_str() {
            "extractor-model" => Ok((0..10)
                .map(|i| format!("Obligation {} binds the parties.", i))
                .collect::<Vec<_>>()
                .join("\n")),
            _ => Err(LlmError::Timeout(Duration::from_secs(30))),
        });
        let pipeline = Pipeline::new(Arc::new(provider), config(PipelineType::Legal)).unwrap();
        let err = pipeline
            .process("Ten obligations.", ProgressReporter::silent())
            .await
            .unwrap_err();

        match err {
            PipelineError::TooManyTimeouts { count, threshold } => {
                assert_eq!(count, 10);
                assert_eq!(threshold, 6);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_catastrophic() {
        let provider = Arc::new(scripted());
        let pipeline = Pipeline::new(Arc::clone(&provider), config(PipelineType::Legal)).unwrap();
        let err = pipeline.process(" \n\t ", ProgressReporter::silent()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_configuration_rejected() {
        let mut config = config(PipelineType::Legal);
        config.settings.chunk_overlap = config.settings.chunk_max_length;
        let result = Pipeline::new(Arc::new(scripted()), config);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_finance_run_with_projections() {
        let provider = MockProvider::default()
            .with_model_response(
                "extractor-model",
                r#"{"metrics": [{"fiscal_year": "2023", "quarter": "Q2", "revenue": 1200, "net_income": 150}]}"#,
            )
            .with_model_response(
                "classifier-model",
                r#"{"revenue": {"label": "Growth", "reason": "up 10%"}, "net_income": "Stable"}"#,
            )
            .with_model_response(
                "generator-model",
                "1. Second-quarter revenue for fiscal 2023 came in at 1200.",
            )
            .with_model_response(
                "evaluator-model",
                r#"{"evaluations": [{"index": 0, "similarity_score": 0.5, "legal_score": 0.7, "should_keep": true, "reason": "ok"}]}"#,
            )
            .with_model_response("projector-model", r#"{"period": "Q3 2023", "revenue": 1300}"#);
        let config = config(PipelineType::Finance)
            .with_output_format(OutputFormat::Json)
            .with_filter(FilterRule::MetricLabel("Growth".into()))
            .with_projections(true);
        let pipeline = Pipeline::new(Arc::new(provider), config).unwrap();

        let result = pipeline
            .process("Revenue for Q2 2023 was 1200.", ProgressReporter::silent())
            .await
            .unwrap();

        assert_eq!(result.stats.filtered, 1);
        let document: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(document["items"][0]["data"]["fields"]["revenue"], 1200);
        assert_eq!(document["items"][0]["classifications"]["revenue"]["label"], "Growth");
        assert_eq!(document["projections"][0]["period"], "Q3 2023");
    }

    fn runner(
        provider: MockProvider,
    ) -> (
        JobRunner<MockProvider, MemoryObjectStore, MemoryJobStore>,
        Arc<MemoryObjectStore>,
        Arc<MemoryJobStore>,
    ) {
        let objects = Arc::new(MemoryObjectStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let runner = JobRunner::new(Arc::new(provider), Arc::clone(&objects), Arc::clone(&jobs));
        (runner, objects, jobs)
    }

    #[tokio::test]
    async fn test_job_completes_and_stores_output() {
        let (runner, objects, _) = runner(scripted());
        objects
            .put("input/contract.txt", b"The Buyer shall pay within 30 days.", "text/plain")
            .unwrap();

        let id = runner.submit().unwrap();
        assert_eq!(runner.status(id).unwrap().unwrap().status, JobStatus::Queued);

        let config = config(PipelineType::Legal).with_output_format(OutputFormat::OpenAiJsonl);
        let record = runner.run(id, config, "input/contract.txt".into()).await.unwrap();

        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.timeouts, 0);
        let key = record.output_key.clone().unwrap();
        assert!(key.starts_with("output/legal_"));
        assert!(key.ends_with(".jsonl"));
        assert_eq!(objects.content_type(&key).as_deref(), Some("application/jsonl"));

        let stored = String::from_utf8(objects.get(&key).unwrap()).unwrap();
        assert_eq!(stored.lines().count(), 4);
        assert_eq!(runner.status(id).unwrap().unwrap(), record);
    }

    #[tokio::test]
    async fn test_job_with_single_timeout_completes_with_warnings() {
        let provider = scripted().with_failure(
            "The Seller may terminate on written notice.",
            scrivener_domain::FailureKind::Timeout,
        );
        let (runner, objects, jobs) = runner(provider);
        objects.put("input/doc.txt", b"Two clauses.", "text/plain").unwrap();

        let id = runner.submit().unwrap();
        let record = runner
            .run(id, config(PipelineType::Legal), "input/doc.txt".into())
            .await
            .unwrap();

        // Classification and generation each time out once
        assert_eq!(record.status, JobStatus::CompletedWithWarnings);
        assert_eq!(record.timeouts, 2);
        assert!(record.output_key.is_some());
        assert_eq!(jobs.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_job_with_missing_input_fails() {
        let (runner, objects, _) = runner(scripted());
        let id = runner.submit().unwrap();
        let record = runner
            .run(id, config(PipelineType::Legal), "input/absent.txt".into())
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("input/absent.txt"));
        assert!(record.output_key.is_none());
        assert!(objects.keys().iter().all(|k| !k.starts_with("output/")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_deadline_marks_job_timed_out() {
        let provider = scripted().with_delay(Duration::from_secs(600));
        let (runner, objects, _) = runner(provider);
        let mut config = config(PipelineType::Legal);
        config.settings.chunk_min_length = 50;
        config.settings.chunk_max_length = 300;
        config.settings.chunk_overlap = 0;
        config.settings.call_timeout_secs = 1;
        config.settings.document_timeout_secs = 2;
        config.settings.timeout_failure_threshold = 100;
        objects
            .put("input/long.txt", document(1200).as_bytes(), "text/plain")
            .unwrap();

        let id = runner.submit().unwrap();
        let record = runner.run(id, config, "input/long.txt".into()).await.unwrap();

        assert_eq!(record.status, JobStatus::TimedOut);
        assert!(record.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_stream_ends_with_result_record() {
        let (runner, objects, _) = runner(scripted());
        objects.put("input/doc.txt", b"Two clauses.", "text/plain").unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let config = config(PipelineType::Legal).with_output_format(OutputFormat::Csv);
        tokio::spawn(async move { runner.stream(config, "input/doc.txt".into(), tx).await });

        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }

        let (last, progress) = records.split_last().unwrap();
        assert!(progress.iter().all(|r| matches!(r, StreamRecord::Progress(_))));
        match last {
            StreamRecord::Result(result) => {
                assert!(result.output.starts_with("original,classification,variant\n"));
                assert!(result.output_key.as_deref().unwrap().ends_with(".csv"));
            }
            other => panic!("unexpected final record: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_reports_missing_input_as_error_record() {
        let (runner, _, _) = runner(scripted());
        let (tx, mut rx) = mpsc::channel(16);
        runner
            .stream(config(PipelineType::Qa), "input/nothing.txt".into(), tx)
            .await;

        match rx.recv().await.unwrap() {
            StreamRecord::Error(record) => {
                assert!(record.message.starts_with("Input not found"));
                assert!(!record.recovery_suggestions.is_empty());
            }
            other => panic!("unexpected record: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_batch_continues_past_failed_document() {
        let batch = BatchRunner::new(Arc::new(scripted()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcomes = batch
            .run(
                &config(PipelineType::Legal),
                vec![
                    DocumentInput::new("blank.txt", "   "),
                    DocumentInput::new("contract.txt", "The Buyer shall pay within 30 days."),
                ],
                Some(tx),
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "blank.txt");
        assert_eq!(
            outcomes[0].result.as_ref().unwrap_err().message,
            "Input text is empty"
        );
        assert!(outcomes[1].result.as_ref().unwrap().success);

        let mut seen = [false, false];
        while let Ok(event) = rx.try_recv() {
            seen[event.document] = true;
        }
        assert_eq!(seen, [true, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_runs_documents_one_at_a_time_with_delay() {
        let extractions = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&extractions);
        let provider = MockProvider::from_fn(move |req: &ChatRequest| {
            Ok(match req.model.as_str() {
                "extractor-model" => {
                    seen.lock().unwrap().push(tokio::time::Instant::now());
                    CLAUSES.to_string()
                }
                "classifier-model" => "Critical".to_string(),
                "generator-model" => VARIANTS.to_string(),
                _ => EVALUATIONS.to_string(),
            })
        });

        let mut config = config(PipelineType::Legal);
        config.settings.inter_document_delay_ms = 5_000;
        let delay = config.settings.inter_document_delay();

        let batch = BatchRunner::new(Arc::new(provider));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = tokio::time::Instant::now();
        let outcomes = batch
            .run(
                &config,
                vec![
                    DocumentInput::new("a.txt", "The Buyer shall pay within 30 days."),
                    DocumentInput::new("b.txt", "The Seller may terminate on written notice."),
                    DocumentInput::new("c.txt", "Either party may assign with consent."),
                ],
                Some(tx),
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        assert!(started.elapsed() >= delay * 2);

        let calls = extractions.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }

        let mut order = Vec::new();
        while let Ok(event) = rx.try_recv() {
            order.push(event.document);
        }
        assert!(order.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(order.first(), Some(&0));
        assert_eq!(order.last(), Some(&2));
    }
}
