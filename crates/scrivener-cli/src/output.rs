//! Output formatting for the CLI.

use colored::*;
use scrivener_domain::ProgressEvent;
use scrivener_pipeline::{DocumentOutcome, PipelineStats};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(color_enabled: bool) -> Self {
        Self { color_enabled }
    }

    /// Render a progress event as one line.
    pub fn progress_line(&self, event: &ProgressEvent) -> String {
        let line = format!("[{:>3}%] {}: {}", event.progress, event.stage, event.message);
        if event.is_warning() {
            self.colorize(&line, "yellow")
        } else {
            line
        }
    }

    /// Render run statistics as a two-column table.
    pub fn stats_table(&self, stats: &PipelineStats) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Metric", "Value"]);

        let truncated = if stats.truncated {
            format!("{} (truncated)", stats.processed_chars)
        } else {
            stats.processed_chars.to_string()
        };
        let deduplicated = with_flag(stats.deduplicated, stats.dedup_fallback, "exact match");
        let filtered = with_flag(stats.filtered, stats.filter_fallback, "fallback");

        let rows: Vec<(&str, String)> = vec![
            ("Characters", truncated),
            ("Chunks", stats.chunks.to_string()),
            ("Extracted", stats.extracted.to_string()),
            ("Deduplicated", deduplicated),
            ("Classified", stats.classified.to_string()),
            ("Filtered", filtered),
            ("Variants generated", stats.variants_generated.to_string()),
            ("Variants kept", stats.variants_kept.to_string()),
            ("Timeouts", stats.failures.timeouts.to_string()),
            ("API errors", stats.failures.api_errors.to_string()),
            ("Parse errors", stats.failures.parse_errors.to_string()),
            ("Warnings", stats.warnings.to_string()),
            ("Duration", format!("{:.1}s", stats.duration_ms as f64 / 1000.0)),
        ];
        for (label, value) in &rows {
            builder.push_record([*label, value.as_str()]);
        }

        self.build_table(builder)
    }

    /// Render per-document batch outcomes.
    pub fn batch_table(&self, outcomes: &[DocumentOutcome]) -> String {
        if outcomes.is_empty() {
            return self.colorize("No documents processed.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Document", "Status", "Variants", "Detail"]);

        for outcome in outcomes {
            match &outcome.result {
                Ok(result) => {
                    let detail = result.output_key.clone().unwrap_or_default();
                    builder.push_record([
                        outcome.name.as_str(),
                        "ok",
                        &result.stats.variants_kept.to_string(),
                        &detail,
                    ]);
                }
                Err(error) => {
                    builder.push_record([outcome.name.as_str(), "failed", "-", &error.message]);
                }
            }
        }

        self.build_table(builder)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn build_table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn with_flag(count: usize, flagged: bool, label: &str) -> String {
    if flagged {
        format!("{} ({})", count, label)
    } else {
        count.to_string()
    }
}
