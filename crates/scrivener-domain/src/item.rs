//! Item module - candidate units pulled out of a document

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Which pipeline a document runs through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    /// Contract clauses
    Legal,
    /// Generic question/answer material, processed as clauses
    Qa,
    /// Financial statements, processed as metric sets
    Finance,
}

/// The two item shapes sharing the pipeline skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Free-text clauses labelled Critical/Important/Standard
    Clause,
    /// Metric sets labelled per field
    Metrics,
}

impl PipelineType {
    /// Get the pipeline name as used on the wire and in output keys
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Legal => "legal",
            PipelineType::Qa => "qa",
            PipelineType::Finance => "finance",
        }
    }

    /// Parse a pipeline type from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "legal" => Some(PipelineType::Legal),
            "qa" => Some(PipelineType::Qa),
            "finance" => Some(PipelineType::Finance),
            _ => None,
        }
    }

    /// Item shape produced by this pipeline
    pub fn flavor(&self) -> Flavor {
        match self {
            PipelineType::Legal | PipelineType::Qa => Flavor::Clause,
            PipelineType::Finance => Flavor::Metrics,
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid pipeline type: {}", s))
    }
}

/// Output encoding of the final dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// One chat-style record per variant
    #[serde(rename = "openai-jsonl")]
    OpenAiJsonl,
    /// One record per item
    #[serde(rename = "jsonl")]
    Jsonl,
    /// A single JSON document
    #[serde(rename = "json")]
    Json,
    /// One row per variant
    #[serde(rename = "csv")]
    Csv,
}

impl OutputFormat {
    /// Get the format name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::OpenAiJsonl => "openai-jsonl",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    /// Parse a format from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai-jsonl" | "openai_jsonl" => Some(OutputFormat::OpenAiJsonl),
            "jsonl" => Some(OutputFormat::Jsonl),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    /// File extension for stored artifacts
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::OpenAiJsonl | OutputFormat::Jsonl => "jsonl",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    /// MIME type for stored artifacts
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::OpenAiJsonl | OutputFormat::Jsonl => "application/jsonl",
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid output format: {}", s))
    }
}

/// A set of financial metrics reported for one fiscal period
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSet {
    /// Fiscal year, e.g. "2024"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<String>,

    /// Quarter, e.g. "Q3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,

    /// Metric name → reported value
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl MetricSet {
    /// Metric names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Render the set as a plain-language statement
    ///
    /// # Examples
    ///
    /// ```
    /// use scrivener_domain::MetricSet;
    ///
    /// let mut set = MetricSet::default();
    /// set.fiscal_year = Some("2024".into());
    /// set.fields.insert("net_revenue".into(), "12.4M".into());
    /// assert_eq!(set.render(), "In fiscal year 2024, net revenue was 12.4M.");
    /// ```
    pub fn render(&self) -> String {
        let period = match (&self.fiscal_year, &self.quarter) {
            (Some(year), Some(quarter)) => format!("In {} of fiscal year {}, ", quarter, year),
            (Some(year), None) => format!("In fiscal year {}, ", year),
            (None, Some(quarter)) => format!("In {}, ", quarter),
            (None, None) => String::new(),
        };

        let facts: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{} was {}", name.replace('_', " "), value)
            })
            .collect();

        let body = facts.join(", ");
        let sentence = format!("{}{}", period, body);
        let mut chars = sentence.chars();
        let mut rendered = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        if !rendered.is_empty() {
            rendered.push('.');
        }
        rendered
    }
}

/// A candidate unit of information extracted from text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    /// A single clause sentence
    Clause {
        /// Clause text
        text: String,
        /// Chunk the clause was pulled from
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_text: Option<String>,
    },
    /// A metric set for one period
    Metrics {
        /// The metric values
        set: MetricSet,
        /// Chunk the metrics were pulled from
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_text: Option<String>,
    },
}

impl Item {
    /// Build a clause item without a source reference
    pub fn clause(text: impl Into<String>) -> Self {
        Item::Clause {
            text: text.into(),
            source_text: None,
        }
    }

    /// Build a metrics item without a source reference
    pub fn metrics(set: MetricSet) -> Self {
        Item::Metrics {
            set,
            source_text: None,
        }
    }

    /// Item shape
    pub fn flavor(&self) -> Flavor {
        match self {
            Item::Clause { .. } => Flavor::Clause,
            Item::Metrics { .. } => Flavor::Metrics,
        }
    }

    /// Text handed to models and written as `original` in outputs
    pub fn text(&self) -> String {
        match self {
            Item::Clause { text, .. } => text.clone(),
            Item::Metrics { set, .. } => set.render(),
        }
    }

    /// Chunk this item was extracted from, if recorded
    pub fn source_text(&self) -> Option<&str> {
        match self {
            Item::Clause { source_text, .. } | Item::Metrics { source_text, .. } => {
                source_text.as_deref()
            }
        }
    }
}
