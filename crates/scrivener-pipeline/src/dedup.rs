//! Deduplication of extracted items

use scrivener_domain::Item;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Result of a deduplication pass
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    /// Surviving items in first-occurrence order
    pub items: Vec<Item>,
    /// Whether the raw-value fallback was used
    pub used_fallback: bool,
}

/// Lower-case, strip punctuation, collapse whitespace
pub fn normalize_clause(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized identity of an item, `None` when one cannot be derived
pub fn dedup_key(item: &Item) -> Option<String> {
    match item {
        Item::Clause { text, .. } => {
            let normalized = normalize_clause(text);
            (!normalized.is_empty()).then_some(normalized)
        }
        Item::Metrics { set, .. } => {
            if set.fiscal_year.is_none() && set.quarter.is_none() && set.fields.is_empty() {
                return None;
            }
            let fields: Vec<&str> = set.field_names().collect();
            Some(format!(
                "{}|{}|{}",
                set.fiscal_year.as_deref().unwrap_or_default(),
                set.quarter.as_deref().unwrap_or_default(),
                fields.join(",")
            ))
        }
    }
}

/// Collapses items that share a normalized key
pub struct Deduplicator;

impl Deduplicator {
    /// Deduplicate `items`, keeping first-occurrence order
    pub fn dedup(items: Vec<Item>) -> DedupOutcome {
        let keys: Option<Vec<String>> = items.iter().map(dedup_key).collect();
        let Some(keys) = keys else {
            warn!("Item without a normalized key; falling back to exact-match deduplication");
            return DedupOutcome {
                items: Self::dedup_raw(items),
                used_fallback: true,
            };
        };

        let before = items.len();
        let mut kept: Vec<Item> = Vec::with_capacity(before);
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(before);
        for (item, key) in items.into_iter().zip(keys) {
            match positions.get(&key) {
                Some(&pos) => {
                    let richer = matches!(
                        (&kept[pos], &item),
                        (Item::Metrics { set: existing, .. }, Item::Metrics { set: incoming, .. })
                            if incoming.fields.len() > existing.fields.len()
                    );
                    if richer {
                        kept[pos] = item;
                    }
                }
                None => {
                    positions.insert(key, kept.len());
                    kept.push(item);
                }
            }
        }

        debug!("Deduplicated {} items to {}", before, kept.len());
        DedupOutcome {
            items: kept,
            used_fallback: false,
        }
    }

    fn dedup_raw(items: Vec<Item>) -> Vec<Item> {
        let mut seen = HashSet::with_capacity(items.len());
        items
            .into_iter()
            .filter(|item| {
                let raw = match item {
                    Item::Clause { text, .. } => text.clone(),
                    Item::Metrics { set, .. } => serde_json::to_string(set).unwrap_or_default(),
                };
                seen.insert(raw)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scrivener_domain::MetricSet;

    fn metrics(year: &str, fields: &[(&str, i64)]) -> Item {
        let mut set = MetricSet {
            fiscal_year: Some(year.to_string()),
            ..MetricSet::default()
        };
        for (name, value) in fields {
            set.fields.insert(name.to_string(), (*value).into());
        }
        Item::metrics(set)
    }

    #[test]
    fn test_clause_normalization_merges_variants() {
        let outcome = Deduplicator::dedup(vec![
            Item::clause("Pay within 30 days"),
            Item::clause("pay within 30 days."),
            Item::clause("Pay within thirty days"),
        ]);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].text(), "Pay within 30 days");
        assert_eq!(outcome.items[1].text(), "Pay within thirty days");
    }

    #[test]
    fn test_metric_sets_keyed_by_period_and_fields() {
        let outcome = Deduplicator::dedup(vec![
            metrics("2023", &[("revenue", 10)]),
            metrics("2023", &[("revenue", 11)]),
            metrics("2024", &[("revenue", 10)]),
        ]);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0], metrics("2023", &[("revenue", 10)]));
    }

    #[test]
    fn test_unkeyable_item_triggers_fallback() {
        let outcome = Deduplicator::dedup(vec![
            Item::clause("Pay within 30 days"),
            Item::clause("pay within 30 days."),
            Item::clause("..."),
            Item::clause("Pay within 30 days"),
        ]);
        assert!(outcome.used_fallback);
        let texts: Vec<String> = outcome.items.iter().map(Item::text).collect();
        assert_eq!(texts, vec!["Pay within 30 days", "pay within 30 days.", "..."]);
    }

    #[test]
    fn test_empty_metric_set_triggers_fallback() {
        let outcome = Deduplicator::dedup(vec![Item::metrics(MetricSet::default())]);
        assert!(outcome.used_fallback);
        assert_eq!(outcome.items.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_keys_are_distinct(texts in proptest::collection::vec("[A-Za-z .,]{1,12}", 0..40)) {
            let items: Vec<Item> = texts.iter().map(Item::clause).collect();
            let before = items.len();
            let outcome = Deduplicator::dedup(items);
            prop_assert!(outcome.items.len() <= before);
            if !outcome.used_fallback {
                let keys: HashSet<String> =
                    outcome.items.iter().filter_map(dedup_key).collect();
                prop_assert_eq!(keys.len(), outcome.items.len());
            }
        }
    }
}
