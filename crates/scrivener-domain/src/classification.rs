//! Classification module - importance labels attached to items

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Importance label for a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClauseLabel {
    /// Must survive any filter
    Critical,
    /// Worth keeping under `important_plus`
    Important,
    /// Default label
    #[default]
    Standard,
}

impl ClauseLabel {
    /// Sort priority (higher first)
    pub fn priority(&self) -> u8 {
        match self {
            ClauseLabel::Critical => 3,
            ClauseLabel::Important => 2,
            ClauseLabel::Standard => 1,
        }
    }

    /// Get the label name
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseLabel::Critical => "Critical",
            ClauseLabel::Important => "Important",
            ClauseLabel::Standard => "Standard",
        }
    }

    /// Parse an exact label name, ignoring case and surrounding whitespace
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(ClauseLabel::Critical),
            "important" => Some(ClauseLabel::Important),
            "standard" => Some(ClauseLabel::Standard),
            _ => None,
        }
    }

    /// Find the first label mentioned as a whole word in free text
    ///
    /// Models often answer "Classification: Important" or wrap the label in
    /// quotes. A label directly after "not", "no" or "non" is skipped, so
    /// "Not critical; Standard" reads as `Standard`.
    pub fn find_in(text: &str) -> Option<Self> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        words.iter().enumerate().find_map(|(idx, word)| {
            let label = ClauseLabel::parse(word)?;
            let negated = idx > 0 && matches!(words[idx - 1].as_str(), "not" | "no" | "non");
            (!negated).then_some(label)
        })
    }
}

impl fmt::Display for ClauseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label assigned to one metric field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricLabel {
    /// Label text from the classifier
    pub label: String,

    /// Classifier's justification
    #[serde(default)]
    pub reason: String,
}

impl MetricLabel {
    /// Priority of the label; labels outside the clause vocabulary rank lowest
    pub fn priority(&self) -> u8 {
        ClauseLabel::parse(&self.label)
            .map(|label| label.priority())
            .unwrap_or(0)
    }
}

/// Classification attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Classification {
    /// Clause importance
    Clause(ClauseLabel),
    /// Per-field metric labels
    Metrics(BTreeMap<String, MetricLabel>),
}

impl Classification {
    /// Sort priority; for metric sets the highest field priority
    pub fn priority(&self) -> u8 {
        match self {
            Classification::Clause(label) => label.priority(),
            Classification::Metrics(fields) => {
                fields.values().map(MetricLabel::priority).max().unwrap_or(0)
            }
        }
    }

    /// Clause label, if this is a clause classification
    pub fn clause_label(&self) -> Option<ClauseLabel> {
        match self {
            Classification::Clause(label) => Some(*label),
            Classification::Metrics(_) => None,
        }
    }

    /// Whether any metric field carries `target` (case-insensitive)
    pub fn has_metric_label(&self, target: &str) -> bool {
        match self {
            Classification::Metrics(fields) => fields
                .values()
                .any(|field| field.label.eq_ignore_ascii_case(target.trim())),
            Classification::Clause(_) => false,
        }
    }

    /// Compact single-line rendering used in CSV output
    pub fn summary(&self) -> String {
        match self {
            Classification::Clause(label) => label.to_string(),
            Classification::Metrics(fields) => fields
                .iter()
                .map(|(name, field)| format!("{}:{}", name, field.label))
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_priorities() {
        assert!(ClauseLabel::Critical.priority() > ClauseLabel::Important.priority());
        assert!(ClauseLabel::Important.priority() > ClauseLabel::Standard.priority());
    }

    #[test]
    fn test_find_in_free_text() {
        assert_eq!(
            ClauseLabel::find_in("Classification: IMPORTANT"),
            Some(ClauseLabel::Important)
        );
        assert_eq!(
            ClauseLabel::find_in("critical, not standard"),
            Some(ClauseLabel::Critical)
        );
        assert_eq!(ClauseLabel::find_in("no idea"), None);
    }

    #[test]
    fn test_find_in_skips_negated_labels() {
        assert_eq!(
            ClauseLabel::find_in("Not critical; Standard"),
            Some(ClauseLabel::Standard)
        );
        assert_eq!(
            ClauseLabel::find_in("This is no important clause, just standard."),
            Some(ClauseLabel::Standard)
        );
        assert_eq!(ClauseLabel::find_in("not critical"), None);
    }

    #[test]
    fn test_find_in_matches_whole_words() {
        assert_eq!(ClauseLabel::find_in("Noncritical, substandard"), None);
        assert_eq!(
            ClauseLabel::find_in("\"Important\" (non-standard)"),
            Some(ClauseLabel::Important)
        );
    }

    #[test]
    fn test_default_label_is_standard() {
        assert_eq!(ClauseLabel::default(), ClauseLabel::Standard);
    }

    #[test]
    fn test_metric_priority_unknown_label_is_lowest() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "revenue".to_string(),
            MetricLabel {
                label: "growth".into(),
                reason: String::new(),
            },
        );
        let classification = Classification::Metrics(fields.clone());
        assert_eq!(classification.priority(), 0);

        fields.insert(
            "debt".to_string(),
            MetricLabel {
                label: "critical".into(),
                reason: "covenant".into(),
            },
        );
        assert_eq!(Classification::Metrics(fields).priority(), 3);
    }

    #[test]
    fn test_has_metric_label() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "ebitda".to_string(),
            MetricLabel {
                label: "Key".into(),
                reason: String::new(),
            },
        );
        let classification = Classification::Metrics(fields);
        assert!(classification.has_metric_label("key"));
        assert!(!classification.has_metric_label("minor"));
        assert!(!Classification::Clause(ClauseLabel::Critical).has_metric_label("key"));
    }

    #[test]
    fn test_summary() {
        assert_eq!(Classification::Clause(ClauseLabel::Critical).summary(), "Critical");
        assert_eq!(Classification::Metrics(BTreeMap::new()).summary(), "");
    }
}
