//! Variant module - classified items and their rewritten variants

use crate::classification::Classification;
use crate::item::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of variants kept per item
pub const MAX_VARIANTS: usize = 3;

/// An item with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    /// The deduplicated item
    pub item: Item,

    /// Label(s) assigned by the classifier
    pub classification: Classification,
}

/// Rewritten variants for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSet {
    /// Item the variants were generated from
    pub original: Item,

    /// Classification carried over from the filter stage
    pub classification: Classification,

    /// At most [`MAX_VARIANTS`] complete sentences
    pub variants: Vec<String>,

    /// Forward-looking projection (metrics flavor only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Value>,
}

impl VariantSet {
    /// Variant set with no variants, used when generation fails
    pub fn empty(classified: ClassifiedItem) -> Self {
        Self {
            original: classified.item,
            classification: classified.classification,
            variants: Vec::new(),
            projection: None,
        }
    }
}

/// Aggregate scores over an item's surviving variants
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Variants dropped by the assessor
    pub filtered_count: usize,

    /// Mean similarity over kept variants
    pub avg_similarity: f64,

    /// Mean fidelity score over kept variants (0 under the heuristic fallback)
    pub avg_legal_score: f64,

    /// Candidate variants evaluated
    pub total_variants: usize,

    /// Scores came from the word-overlap heuristic
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback_method: bool,

    /// No evaluation was possible; variants passed through unfiltered
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub evaluation_failed: bool,
}

/// A variant set after quality assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedVariantSet {
    /// Variant set with low-quality variants removed
    #[serde(flatten)]
    pub set: VariantSet,

    /// How the surviving variants scored
    pub quality_metrics: QualityMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ClauseLabel;

    #[test]
    fn test_empty_variant_set() {
        let classified = ClassifiedItem {
            item: Item::clause("Fees are non-refundable."),
            classification: Classification::Clause(ClauseLabel::Important),
        };
        let set = VariantSet::empty(classified);
        assert!(set.variants.is_empty());
        assert!(set.projection.is_none());
        assert_eq!(set.classification.clause_label(), Some(ClauseLabel::Important));
    }

    #[test]
    fn test_quality_flags_omitted_when_false() {
        let json = serde_json::to_value(QualityMetrics::default()).unwrap();
        assert!(json.get("fallback_method").is_none());
        assert!(json.get("evaluation_failed").is_none());

        let flagged = QualityMetrics {
            fallback_method: true,
            ..Default::default()
        };
        let json = serde_json::to_value(flagged).unwrap();
        assert_eq!(json["fallback_method"], true);
    }
}
