//! Model registry - which model serves which pipeline role

use scrivener_domain::ModelRole;
use serde::{Deserialize, Serialize};

/// Default model used for every role
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Model identifiers per pipeline role
///
/// Fine-tuned model ids are deployment-specific, so they are configuration
/// rather than constants.
///
/// # Examples
///
/// ```
/// use scrivener_llm::ModelRegistry;
/// use scrivener_domain::ModelRole;
///
/// let registry = ModelRegistry::default()
///     .with_model(ModelRole::Classifier, "ft:gpt-4o-mini:acme:clauses");
/// assert_eq!(registry.model_for(ModelRole::Classifier), "ft:gpt-4o-mini:acme:clauses");
/// assert_eq!(registry.model_for(ModelRole::Extractor), "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRegistry {
    /// Model pulling items out of chunks
    #[serde(default = "default_model")]
    pub extractor: String,

    /// Model labelling items
    #[serde(default = "default_model")]
    pub classifier: String,

    /// Model rewriting items into variants
    #[serde(default = "default_model")]
    pub generator: String,

    /// Model judging variant quality
    #[serde(default = "default_model")]
    pub evaluator: String,

    /// Model producing metric projections
    #[serde(default = "default_model")]
    pub projector: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::uniform(DEFAULT_MODEL)
    }
}

impl ModelRegistry {
    /// Registry serving every role with the same model
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            extractor: model.clone(),
            classifier: model.clone(),
            generator: model.clone(),
            evaluator: model.clone(),
            projector: model,
        }
    }

    /// Model identifier for `role`
    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Extractor => &self.extractor,
            ModelRole::Classifier => &self.classifier,
            ModelRole::Generator => &self.generator,
            ModelRole::Evaluator => &self.evaluator,
            ModelRole::Projector => &self.projector,
        }
    }

    /// Replace the model for `role`
    pub fn with_model(mut self, role: ModelRole, model: impl Into<String>) -> Self {
        let model = model.into();
        match role {
            ModelRole::Extractor => self.extractor = model,
            ModelRole::Classifier => self.classifier = model,
            ModelRole::Generator => self.generator = model,
            ModelRole::Evaluator => self.evaluator = model,
            ModelRole::Projector => self.projector = model,
        }
        self
    }

    /// Registry with a distinct `<role>-model` id per role (useful with mocks)
    pub fn per_role() -> Self {
        Self {
            extractor: "extractor-model".to_string(),
            classifier: "classifier-model".to_string(),
            generator: "generator-model".to_string(),
            evaluator: "evaluator-model".to_string(),
            projector: "projector-model".to_string(),
        }
    }
}
