//! User filter rules, priority ordering and the final cap

use crate::config::{FilterRule, PipelineConfiguration};
use scrivener_domain::{Classification, ClassifiedItem, ClauseLabel, Flavor};
use std::cmp::Reverse;
use tracing::{debug, warn};

/// Result of filtering
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Retained items
    pub items: Vec<ClassifiedItem>,
    /// Why the rule could not be applied, if it could not
    pub error: Option<String>,
}

impl FilterOutcome {
    /// Whether the fallback slice was used
    pub fn used_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Applies a [`FilterRule`] to classified items
#[derive(Debug, Clone)]
pub struct ItemFilter {
    rule: FilterRule,
    flavor: Flavor,
    prioritize: bool,
    cap: usize,
    fallback_count: usize,
}

impl ItemFilter {
    /// Create a filter
    pub fn new(
        rule: FilterRule,
        flavor: Flavor,
        prioritize: bool,
        cap: usize,
        fallback_count: usize,
    ) -> Self {
        Self {
            rule,
            flavor,
            prioritize,
            cap,
            fallback_count,
        }
    }

    /// Filter configured for a run
    pub fn from_configuration(config: &PipelineConfiguration) -> Self {
        let flavor = config.flavor();
        Self::new(
            config.filter.clone(),
            flavor,
            config.prioritize,
            config.settings.cap_for(flavor),
            config.settings.fallback_count_for(flavor),
        )
    }

    /// Filter, optionally sort by priority, and cap
    ///
    /// When the rule cannot be applied the first `fallback_count` items are
    /// returned unfiltered.
    pub fn apply(&self, mut items: Vec<ClassifiedItem>) -> FilterOutcome {
        if let Err(error) = self.check_rule() {
            warn!("Filter rule not applied: {}", error);
            items.truncate(self.fallback_count);
            return FilterOutcome {
                items,
                error: Some(error),
            };
        }

        let before = items.len();
        items.retain(|item| self.keeps(&item.classification));
        if self.prioritize {
            // Stable: equal priorities keep extraction order.
            items.sort_by_key(|item| Reverse(item.classification.priority()));
        }
        items.truncate(self.cap);
        debug!("Filter kept {} of {} items", items.len(), before);

        FilterOutcome { items, error: None }
    }

    fn check_rule(&self) -> Result<(), String> {
        match (&self.rule, self.flavor) {
            (FilterRule::All, _) => Ok(()),
            (FilterRule::CriticalOnly | FilterRule::ImportantPlus, Flavor::Clause) => Ok(()),
            (FilterRule::CriticalOnly | FilterRule::ImportantPlus, Flavor::Metrics) => {
                Err("clause filters do not apply to metric sets".to_string())
            }
            (FilterRule::MetricLabel(_), Flavor::Clause) => {
                Err("metric label filters do not apply to clauses".to_string())
            }
            (FilterRule::MetricLabel(target), Flavor::Metrics) if target.trim().is_empty() => {
                Err("metric label filter is empty".to_string())
            }
            (FilterRule::MetricLabel(_), Flavor::Metrics) => Ok(()),
        }
    }

    fn keeps(&self, classification: &Classification) -> bool {
        match &self.rule {
            FilterRule::All => true,
            FilterRule::CriticalOnly => classification.clause_label() == Some(ClauseLabel::Critical),
            FilterRule::ImportantPlus => matches!(
                classification.clause_label(),
                Some(ClauseLabel::Critical | ClauseLabel::Important)
            ),
            FilterRule::MetricLabel(target) => match classification {
                Classification::Metrics(fields) if fields.is_empty() => true,
                other => other.has_metric_label(target),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_domain::{Item, MetricLabel, MetricSet};
    use std::collections::BTreeMap;

    fn clause(label: ClauseLabel, n: usize) -> ClassifiedItem {
        ClassifiedItem {
            item: Item::clause(format!("{} clause {}.", label, n)),
            classification: Classification::Clause(label),
        }
    }

    fn mixed() -> Vec<ClassifiedItem> {
        let mut items = Vec::new();
        for n in 0..5 {
            items.push(clause(ClauseLabel::Standard, n));
        }
        for n in 0..3 {
            items.push(clause(ClauseLabel::Important, n));
        }
        for n in 0..2 {
            items.push(clause(ClauseLabel::Critical, n));
        }
        items
    }

    fn metric(labels: &[(&str, &str)]) -> ClassifiedItem {
        let fields: BTreeMap<String, MetricLabel> = labels
            .iter()
            .map(|(field, label)| {
                (
                    field.to_string(),
                    MetricLabel {
                        label: label.to_string(),
                        reason: String::new(),
                    },
                )
            })
            .collect();
        ClassifiedItem {
            item: Item::metrics(MetricSet::default()),
            classification: Classification::Metrics(fields),
        }
    }

    #[test]
    fn test_critical_only() {
        let filter = ItemFilter::new(FilterRule::CriticalOnly, Flavor::Clause, true, 50, 20);
        let outcome = filter.apply(mixed());
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome
            .items
            .iter()
            .all(|i| i.classification.clause_label() == Some(ClauseLabel::Critical)));
    }

    #[test]
    fn test_important_plus_sorted() {
        let filter = ItemFilter::new(FilterRule::ImportantPlus, Flavor::Clause, true, 50, 20);
        let outcome = filter.apply(mixed());
        assert_eq!(outcome.items.len(), 5);
        assert_eq!(
            outcome.items[0].classification.clause_label(),
            Some(ClauseLabel::Critical)
        );
        assert_eq!(outcome.items[0].item.text(), "Critical clause 0.");
    }

    #[test]
    fn test_prioritized_cap_keeps_highest() {
        let filter = ItemFilter::new(FilterRule::All, Flavor::Clause, true, 4, 20);
        let outcome = filter.apply(mixed());
        let labels: Vec<_> = outcome
            .items
            .iter()
            .filter_map(|i| i.classification.clause_label())
            .collect();
        assert_eq!(
            labels,
            vec![
                ClauseLabel::Critical,
                ClauseLabel::Critical,
                ClauseLabel::Important,
                ClauseLabel::Important
            ]
        );
    }

    #[test]
    fn test_unprioritized_keeps_order() {
        let filter = ItemFilter::new(FilterRule::All, Flavor::Clause, false, 3, 20);
        let outcome = filter.apply(mixed());
        assert!(outcome
            .items
            .iter()
            .all(|i| i.classification.clause_label() == Some(ClauseLabel::Standard)));
    }

    #[test]
    fn test_metric_label_filter() {
        let filter = ItemFilter::new(
            FilterRule::MetricLabel("critical".into()),
            Flavor::Metrics,
            true,
            30,
            10,
        );
        let outcome = filter.apply(vec![
            metric(&[("revenue", "Standard")]),
            metric(&[]),
            metric(&[("eps", "Important"), ("revenue", "Critical")]),
        ]);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].classification.priority(), 3);
        assert!(!outcome.used_fallback());
    }

    #[test]
    fn test_mismatched_rule_falls_back() {
        let filter = ItemFilter::new(FilterRule::CriticalOnly, Flavor::Metrics, true, 30, 10);
        let items: Vec<_> = (0..15).map(|_| metric(&[("revenue", "Standard")])).collect();
        let outcome = filter.apply(items);
        assert!(outcome.used_fallback());
        assert_eq!(outcome.items.len(), 10);

        let filter = ItemFilter::new(FilterRule::MetricLabel(" ".into()), Flavor::Metrics, true, 30, 10);
        assert!(filter.apply(vec![metric(&[])]).used_fallback());
    }

    #[test]
    fn test_output_never_exceeds_cap() {
        let items: Vec<_> = (0..80).map(|n| clause(ClauseLabel::Important, n)).collect();
        let filter = ItemFilter::new(FilterRule::ImportantPlus, Flavor::Clause, true, 50, 20);
        assert_eq!(filter.apply(items).items.len(), 50);
    }
}
