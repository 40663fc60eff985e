//! Output encodings for assessed variant sets

use crate::prompt::PromptBuilder;
use crate::sentence::ensure_complete_sentence;
use scrivener_domain::{AssessedVariantSet, ChatMessage, Flavor, Item, OutputFormat, PipelineType};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

/// Reasons an encoding could not be produced
#[derive(Error, Debug)]
pub enum FormatError {
    /// Serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item does not match the pipeline flavor
    #[error("Item of flavor {found:?} in a {expected:?} dataset")]
    FlavorMismatch {
        /// Flavor of the pipeline
        expected: Flavor,
        /// Flavor of the offending item
        found: Flavor,
    },
}

/// Serializes the final dataset
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
    flavor: Flavor,
    system_prompt: &'static str,
}

impl Formatter {
    /// Create a formatter for `format` and `pipeline_type`
    pub fn new(format: OutputFormat, pipeline_type: PipelineType) -> Self {
        Self {
            format,
            flavor: pipeline_type.flavor(),
            system_prompt: PromptBuilder::new(pipeline_type).training_system(),
        }
    }

    /// Encode `items`, falling back to a plain JSON dump on error
    pub fn format(&self, items: &[AssessedVariantSet]) -> String {
        match self.try_format(items) {
            Ok(output) => output,
            Err(e) => {
                warn!("Formatting as {} failed, dumping JSON: {}", self.format.as_str(), e);
                serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }

    /// Encode `items` in the configured format
    pub fn try_format(&self, items: &[AssessedVariantSet]) -> Result<String, FormatError> {
        for item in items {
            let found = item.set.original.flavor();
            if found != self.flavor {
                return Err(FormatError::FlavorMismatch {
                    expected: self.flavor,
                    found,
                });
            }
        }

        match self.format {
            OutputFormat::Jsonl => self.jsonl(items),
            OutputFormat::Json => self.json(items),
            OutputFormat::OpenAiJsonl => self.openai_jsonl(items),
            OutputFormat::Csv => Ok(self.csv(items)),
        }
    }

    fn record(&self, item: &AssessedVariantSet) -> Result<Value, FormatError> {
        let set = &item.set;
        let record = match &set.original {
            Item::Clause { text, .. } => json!({
                "original": ensure_complete_sentence(text),
                "classification": set.classification,
                "variants": set.variants,
                "quality_metrics": item.quality_metrics,
            }),
            Item::Metrics { set: data, .. } => json!({
                "data": serde_json::to_value(data)?,
                "classifications": set.classification,
                "variants": set.variants,
                "quality_metrics": item.quality_metrics,
            }),
        };
        Ok(record)
    }

    fn jsonl(&self, items: &[AssessedVariantSet]) -> Result<String, FormatError> {
        let mut output = String::new();
        for item in items {
            output.push_str(&serde_json::to_string(&self.record(item)?)?);
            output.push('\n');
        }
        Ok(output)
    }

    fn json(&self, items: &[AssessedVariantSet]) -> Result<String, FormatError> {
        let records = items
            .iter()
            .map(|item| self.record(item))
            .collect::<Result<Vec<_>, _>>()?;
        let document = match self.flavor {
            Flavor::Clause => Value::Array(records),
            Flavor::Metrics => {
                let projections: Vec<Value> = items
                    .iter()
                    .map(|item| item.set.projection.clone().unwrap_or(Value::Null))
                    .collect();
                json!({ "items": records, "projections": projections })
            }
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn openai_jsonl(&self, items: &[AssessedVariantSet]) -> Result<String, FormatError> {
        let mut output = String::new();
        for item in items {
            let original = ensure_complete_sentence(&item.set.original.text());
            for variant in &item.set.variants {
                let messages = [
                    ChatMessage::system(self.system_prompt),
                    ChatMessage::user(original.as_str()),
                    ChatMessage::assistant(variant.as_str()),
                ];
                output.push_str(&serde_json::to_string(&json!({ "messages": messages }))?);
                output.push('\n');
            }
        }
        Ok(output)
    }

    fn csv(&self, items: &[AssessedVariantSet]) -> String {
        let mut output = String::from("original,classification,variant\n");
        for item in items {
            let original = csv_field(&ensure_complete_sentence(&item.set.original.text()));
            let classification = csv_field(&item.set.classification.summary());
            if item.set.variants.is_empty() {
                output.push_str(&format!("{},{},\"\"\n", original, classification));
            }
            for variant in &item.set.variants {
                output.push_str(&format!("{},{},{}\n", original, classification, csv_field(variant)));
            }
        }
        output
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
