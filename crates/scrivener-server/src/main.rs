//! Scrivener server binary
//!
//! Starts the HTTP server for streaming and job-based dataset generation.

use scrivener_server::{config::ScrivenerConfig, start_server, ServerError};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        ScrivenerConfig::from_file(&args[2])?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        eprintln!("Warning: No config file specified, using defaults");
        eprintln!("Usage: scrivener-server --config <path-to-config.toml>");
        eprintln!();
        ScrivenerConfig::default()
    };

    start_server(config).await
}

fn print_help() {
    println!("Scrivener Server - Synthetic training data from documents");
    println!();
    println!("USAGE:");
    println!("    scrivener-server --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("ENDPOINTS:");
    println!("    POST /pipeline/stream   Run a pipeline, streaming NDJSON records");
    println!("    POST /jobs              Submit a pipeline job");
    println!("    GET  /jobs/{{id}}         Poll a job");
    println!("    GET  /health            Liveness check");
    println!();
    println!("CONFIGURATION:");
    println!("    [llm]       endpoint, api_key_env (default OPENAI_API_KEY), timeout_secs, max_retries");
    println!("    [models]    extractor, classifier, generator, evaluator, projector");
    println!("    [pipeline]  limits, batch sizes, concurrency, timeouts");
    println!("    [server]    bind_address, bind_port");
    println!("    [storage]   root directory for input and output objects");
    println!();
}
