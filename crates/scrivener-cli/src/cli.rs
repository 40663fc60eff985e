//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use scrivener_domain::{OutputFormat, PipelineType};
use scrivener_pipeline::{PipelineRequest, PipelineSettings};

/// Scrivener CLI - Turn documents into synthetic training datasets.
#[derive(Debug, Parser)]
#[command(name = "scrivener")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SCRIVENER_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process one text document
    Process(ProcessArgs),

    /// Process several documents, one at a time
    Batch(BatchArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Pipeline options shared by `process` and `batch`.
#[derive(Debug, Clone, clap::Args)]
pub struct PipelineArgs {
    /// Pipeline type
    #[arg(short = 't', long = "type", value_enum, default_value = "legal")]
    pub pipeline_type: PipelineTypeArg,

    /// Output encoding
    #[arg(short = 'f', long, value_enum, default_value = "jsonl")]
    pub format: FormatArg,

    /// Clause filter: all, critical_only, important_plus
    #[arg(long)]
    pub class_filter: Option<String>,

    /// Keep metric sets carrying this label
    #[arg(long)]
    pub metric_filter: Option<String>,

    /// Keep extraction order instead of sorting by priority
    #[arg(long)]
    pub no_prioritize: bool,

    /// Ask the projector model for next-period projections
    #[arg(long)]
    pub projections: bool,

    /// Maximum chunk length in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunk overlap in characters
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// File with an organizational writing sample
    #[arg(long)]
    pub style_sample: Option<String>,

    /// Settings preset overriding the configuration file
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,
}

impl PipelineArgs {
    /// Invocation request for a document named `name`
    pub fn to_request(&self, name: &str, style_sample: Option<String>) -> PipelineRequest {
        let mut request = PipelineRequest::new(name, self.pipeline_type.into());
        request.output_format = self.format.into();
        request.class_filter = self.class_filter.clone();
        request.metric_filter = self.metric_filter.clone();
        request.prioritize_important = !self.no_prioritize;
        request.generate_projections = self.projections;
        request.chunk_size = self.chunk_size;
        request.chunk_overlap = self.chunk_overlap;
        request.org_style_sample = style_sample;
        request
    }

    /// Settings after applying the preset, if any
    pub fn settings(&self, configured: &PipelineSettings) -> PipelineSettings {
        match self.preset {
            Some(PresetArg::Fast) => PipelineSettings::fast(),
            Some(PresetArg::Thorough) => PipelineSettings::thorough(),
            Some(PresetArg::Default) => PipelineSettings::default(),
            None => configured.clone(),
        }
    }
}

/// Arguments for the process command.
#[derive(Debug, Parser)]
pub struct ProcessArgs {
    /// Text file to process
    pub file: String,

    /// Write the dataset here instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Print run statistics as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments for the batch command.
#[derive(Debug, Parser)]
pub struct BatchArgs {
    /// Text files to process
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<String>,

    /// Directory for the datasets (default: next to each input)
    #[arg(short = 'd', long)]
    pub output_dir: Option<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Pipeline type argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PipelineTypeArg {
    /// Contract clauses
    Legal,
    /// Quality-assurance procedures
    Qa,
    /// Financial metrics
    Finance,
}

/// Output format argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum FormatArg {
    /// Chat fine-tuning lines
    #[value(name = "openai-jsonl")]
    OpenaiJsonl,
    /// One record per line
    Jsonl,
    /// Pretty JSON document
    Json,
    /// Quoted CSV rows
    Csv,
}

/// Settings preset argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PresetArg {
    /// Smaller caps and shorter timeouts
    Fast,
    /// Balanced defaults
    Default,
    /// Larger caps and longer timeouts
    Thorough,
}

impl From<PipelineTypeArg> for PipelineType {
    fn from(arg: PipelineTypeArg) -> Self {
        match arg {
            PipelineTypeArg::Legal => PipelineType::Legal,
            PipelineTypeArg::Qa => PipelineType::Qa,
            PipelineTypeArg::Finance => PipelineType::Finance,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::OpenaiJsonl => OutputFormat::OpenAiJsonl,
            FormatArg::Jsonl => OutputFormat::Jsonl,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}
