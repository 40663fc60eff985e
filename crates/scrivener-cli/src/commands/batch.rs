//! Batch command implementation.

use super::{document_name, drain_events, progress_bar, read_style_sample};
use crate::cli::BatchArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use scrivener_domain::ChatProvider;
use scrivener_pipeline::{BatchRunner, DocumentInput, DocumentOutcome, ErrorRecord};
use scrivener_server::config::ScrivenerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Execute the batch command.
///
/// Documents run one at a time. Each dataset is written next to its input,
/// or into `--output-dir`, with the extension of the chosen format. Files
/// that cannot be read are reported as failed documents.
pub async fn execute_batch<P: ChatProvider + 'static>(
    args: BatchArgs,
    provider: Arc<P>,
    config: &ScrivenerConfig,
    formatter: &Formatter,
) -> Result<Vec<DocumentOutcome>> {
    let style_sample = read_style_sample(args.pipeline.style_sample.as_deref())?;
    let settings = args.pipeline.settings(&config.pipeline);
    let configuration = args
        .pipeline
        .to_request("batch", style_sample)
        .into_configuration(settings, config.models.clone())?;

    let mut unreadable = Vec::new();
    let mut documents = Vec::new();
    let mut sources = Vec::new();
    for file in &args.files {
        let name = document_name(file);
        match fs::read_to_string(file) {
            Ok(text) => {
                documents.push(DocumentInput::new(name, text));
                sources.push(PathBuf::from(file));
            }
            Err(e) => {
                warn!("Skipping {}: {}", file, e);
                unreadable.push(DocumentOutcome {
                    name,
                    result: Err(ErrorRecord {
                        message: format!("Failed to read {}", file),
                        details: e.to_string(),
                        recovery_suggestions: vec!["Check the file path and permissions".to_string()],
                    }),
                });
            }
        }
    }

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    let pb = progress_bar(documents.len());
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = BatchRunner::new(provider);
    let (mut outcomes, ()) = tokio::join!(
        runner.run(&configuration, documents, Some(tx)),
        drain_events(rx, &pb, formatter, true),
    );
    pb.finish_and_clear();

    let extension = configuration.output_format.extension();
    for (outcome, source) in outcomes.iter_mut().zip(&sources) {
        if let Ok(result) = &mut outcome.result {
            let target = output_path(source, args.output_dir.as_deref(), extension);
            fs::write(&target, &result.output)?;
            result.output_key = Some(target.display().to_string());
        }
    }
    outcomes.extend(unreadable);

    eprintln!("{}", formatter.batch_table(&outcomes));

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        return Err(CliError::BatchFailed {
            failed,
            total: outcomes.len(),
        });
    }
    eprintln!(
        "{}",
        formatter.success(&format!("{} document(s) processed", outcomes.len()))
    );
    Ok(outcomes)
}

/// Dataset path for `source`.
fn output_path(source: &Path, output_dir: Option<&str>, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let file_name = format!("{}.dataset.{}", stem, extension);
    match output_dir {
        Some(dir) => Path::new(dir).join(file_name),
        None => source.with_file_name(file_name),
    }
}
