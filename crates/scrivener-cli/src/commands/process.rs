//! Process command implementation.

use super::{document_name, drain_events, progress_bar, read_style_sample};
use crate::cli::ProcessArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use scrivener_domain::ChatProvider;
use scrivener_pipeline::{BatchRunner, DocumentInput, PipelineResult};
use scrivener_server::config::ScrivenerConfig;
use std::fs;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Execute the process command.
///
/// The dataset goes to `--output` when given, otherwise to stdout. Progress
/// and statistics go to stderr.
pub async fn execute_process<P: ChatProvider + 'static>(
    args: ProcessArgs,
    provider: Arc<P>,
    config: &ScrivenerConfig,
    formatter: &Formatter,
) -> Result<PipelineResult> {
    let text = fs::read_to_string(&args.file)?;
    let name = document_name(&args.file);
    let style_sample = read_style_sample(args.pipeline.style_sample.as_deref())?;

    let settings = args.pipeline.settings(&config.pipeline);
    let configuration = args
        .pipeline
        .to_request(&args.file, style_sample)
        .into_configuration(settings, config.models.clone())?;

    let pb = progress_bar(1);
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = BatchRunner::new(provider);
    let (mut outcomes, ()) = tokio::join!(
        runner.run(&configuration, vec![DocumentInput::new(name, text)], Some(tx)),
        drain_events(rx, &pb, formatter, false),
    );
    pb.finish_and_clear();

    let outcome = outcomes
        .pop()
        .ok_or_else(|| CliError::InvalidInput("no document was processed".to_string()))?;
    let mut result = outcome.result.map_err(CliError::Document)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &result.output)?;
            result.output_key = Some(path.clone());
            eprintln!("{}", formatter.success(&format!("Dataset written to {}", path)));
        }
        None => print!("{}", result.output),
    }

    if args.json {
        eprintln!("{}", serde_json::to_string_pretty(&result.stats)?);
    } else {
        eprintln!("{}", formatter.stats_table(&result.stats));
    }
    if result.stats.failures.total() > 0 {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "{} model call(s) failed; the dataset may be incomplete",
                result.stats.failures.total()
            ))
        );
    }

    Ok(result)
}
