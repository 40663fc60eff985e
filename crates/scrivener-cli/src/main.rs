//! Scrivener CLI - Turn local documents into synthetic training datasets.

use clap::Parser;
use scrivener_cli::commands;
use scrivener_cli::config;
use scrivener_cli::{Cli, Command, Formatter};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Logs stay quiet by default so they don't tear the progress bar
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> scrivener_cli::Result<()> {
    let cli = Cli::parse();

    let path = config::resolve_path(cli.config.as_deref())?;
    let settings = config::load(&path)?;
    let formatter = Formatter::new(!cli.no_color);

    match cli.command {
        Command::Config(args) => {
            let output = commands::execute_config(args, &path, &settings, &formatter)?;
            println!("{}", output);
        }
        Command::Process(args) => {
            let provider = Arc::new(settings.build_provider()?);
            commands::execute_process(args, provider, &settings, &formatter).await?;
        }
        Command::Batch(args) => {
            let provider = Arc::new(settings.build_provider()?);
            commands::execute_batch(args, provider, &settings, &formatter).await?;
        }
    }

    Ok(())
}
