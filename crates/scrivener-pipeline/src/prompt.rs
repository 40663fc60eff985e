//! System prompts for each model-calling stage

use scrivener_domain::{Flavor, PipelineType};

/// Style samples longer than this are cut before entering a prompt
const MAX_STYLE_SAMPLE_CHARS: usize = 1_000;

/// Builds system prompts for one pipeline type
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    pipeline_type: PipelineType,
    style_sample: Option<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new(pipeline_type: PipelineType) -> Self {
        Self {
            pipeline_type,
            style_sample: None,
        }
    }

    /// Condition extraction and generation on an organisation's house style
    pub fn with_style_sample(mut self, sample: Option<String>) -> Self {
        self.style_sample = sample
            .map(|s| crate::governor::truncate_chars(s.trim(), MAX_STYLE_SAMPLE_CHARS).to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Prompt for pulling items out of a chunk
    pub fn extraction(&self) -> String {
        let mut prompt = String::new();
        match self.pipeline_type {
            PipelineType::Legal => prompt.push_str(LEGAL_EXTRACTION),
            PipelineType::Qa => prompt.push_str(QA_EXTRACTION),
            PipelineType::Finance => prompt.push_str(FINANCE_EXTRACTION),
        }
        self.push_style(&mut prompt);
        prompt
    }

    /// Prompt for labelling one item
    pub fn classification(&self) -> String {
        match self.pipeline_type.flavor() {
            Flavor::Clause => CLAUSE_CLASSIFICATION.to_string(),
            Flavor::Metrics => METRIC_CLASSIFICATION.to_string(),
        }
    }

    /// Prompt for rewriting one item into variants
    pub fn generation(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(match self.pipeline_type {
            PipelineType::Legal => "You rewrite contract clauses for a legal training dataset.\n",
            PipelineType::Qa => "You rewrite policy and procedure statements for a Q&A training dataset.\n",
            PipelineType::Finance => "You rewrite financial metric statements for a finance training dataset.\n",
        });
        prompt.push_str(GENERATION_RULES);
        self.push_style(&mut prompt);
        prompt
    }

    /// Prompt for judging variants against their original
    pub fn evaluation(&self) -> String {
        let focus = match self.pipeline_type {
            PipelineType::Legal => "legal meaning and enforceability",
            PipelineType::Qa => "factual meaning and procedural accuracy",
            PipelineType::Finance => "numeric accuracy and reporting period",
        };
        format!("{}\nJudge each variant on preservation of {}.", EVALUATION_RULES, focus)
    }

    /// Prompt for projecting a metric set forward
    pub fn projection(&self) -> String {
        PROJECTION_RULES.to_string()
    }

    /// System message written into fine-tuning records
    pub fn training_system(&self) -> &'static str {
        match self.pipeline_type {
            PipelineType::Legal => {
                "You are a legal drafting assistant that rewrites contract clauses in clear, professional language."
            }
            PipelineType::Qa => {
                "You are a compliance assistant that restates policies and procedures precisely."
            }
            PipelineType::Finance => {
                "You are a financial reporting assistant that states metrics accurately and professionally."
            }
        }
    }

    /// User content for an evaluation call
    pub fn evaluation_input(&self, original: &str, variants: &[String]) -> String {
        let mut input = format!("Original:\n{}\n\nVariants:\n", original);
        for (index, variant) in variants.iter().enumerate() {
            input.push_str(&format!("{}. {}\n", index, variant));
        }
        input
    }

    fn push_style(&self, prompt: &mut String) {
        if let Some(sample) = &self.style_sample {
            prompt.push_str("\n\nMatch the tone and terminology of this organisation's writing:\n---\n");
            prompt.push_str(sample);
            prompt.push_str("\n---");
        }
    }
}

const LEGAL_EXTRACTION: &str = r#"Extract every distinct contractual clause from the text.
Rules:
- One clause per line, as a complete sentence
- Keep the original wording; do not summarise
- Skip headings, signatures and page furniture
- No numbering, no commentary"#;

const QA_EXTRACTION: &str = r#"Extract every distinct policy requirement, procedure step or control from the text.
Rules:
- One statement per line, as a complete sentence
- Keep the original wording; do not summarise
- Skip headings and page furniture
- No numbering, no commentary"#;

const FINANCE_EXTRACTION: &str = r#"Extract the financial metrics reported in the text, grouped by reporting period.
Respond with a JSON object only:
{"metrics": [{"fiscal_year": "2024", "quarter": "Q2", "metrics": {"revenue": "12.4M", "operating_margin": "18%"}}]}
Omit fiscal_year or quarter when the text does not state them. Use snake_case metric names."#;

const CLAUSE_CLASSIFICATION: &str = r#"Classify the importance of the statement for a compliance review.
Answer with exactly one word: Critical, Important or Standard.
- Critical: liability, termination, indemnity, payment obligations, regulatory duties
- Important: notice periods, warranties, confidentiality, service levels
- Standard: definitions, boilerplate, administrative detail"#;

const METRIC_CLASSIFICATION: &str = r#"Classify each metric in the JSON object by its significance to investors.
Respond with a JSON object mapping every metric name to {"label": "Critical" | "Important" | "Standard", "reason": "<one sentence>"}."#;

const GENERATION_RULES: &str = r#"Write up to 3 alternative versions of the text you are given.
Rules:
- Preserve the meaning exactly, including numbers, parties and time periods
- Use a professional tone
- Each version must be one or more complete sentences
- One version per line, no numbering, no commentary"#;

const EVALUATION_RULES: &str = r#"You evaluate rewritten variants of an original statement.
Respond with a JSON object only:
{"evaluations": [{"index": 0, "similarity_score": 0.0-1.0, "legal_score": 0.0-1.0, "should_keep": true, "reason": "<short reason>"}]}
similarity_score is how close the wording is to the original (1.0 = identical).
legal_score is how well the meaning is preserved (1.0 = fully preserved).
Set should_keep to false for variants that change the meaning or merely copy the original."#;

const PROJECTION_RULES: &str = r#"Given reported financial metrics for one period, project the same metrics for the next period.
Respond with a JSON object only:
{"period": "<next period>", "metrics": {"<name>": "<projected value>"}, "assumptions": "<one sentence>"}"#;
