//! Parse model output into items, labels and evaluations

use scrivener_domain::{ClauseLabel, MetricLabel, MetricSet};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Extract JSON from response, handling markdown code blocks and leading prose
pub fn extract_json(response: &str) -> Result<String, String> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err("Empty code block".to_string());
        }
        // Skip first line (```json or ```) and last line (```)
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        return Ok(lines[1..end].join("\n"));
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed.to_string());
    }

    let open = trimmed
        .find(['{', '['])
        .ok_or_else(|| "No JSON found in response".to_string())?;
    let close = trimmed
        .rfind(['}', ']'])
        .filter(|close| *close > open)
        .ok_or_else(|| "Unterminated JSON in response".to_string())?;
    Ok(trimmed[open..=close].to_string())
}

fn parse_value(response: &str) -> Result<Value, String> {
    let json = extract_json(response)?;
    serde_json::from_str(&json).map_err(|e| format!("JSON parse error: {}", e))
}

/// Parse an extraction answer into metric sets
///
/// Accepts `{"metrics": [...]}` or a bare array. Entries without any metric
/// field are discarded.
pub fn parse_metric_sets(response: &str) -> Result<Vec<MetricSet>, String> {
    let entries = match parse_value(response)? {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("metrics") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Object(fields)) => {
                obj.insert("metrics".to_string(), Value::Object(fields));
                vec![Value::Object(obj)]
            }
            _ => return Err("Expected a 'metrics' array".to_string()),
        },
        _ => return Err("Expected a JSON object or array".to_string()),
    };

    let mut sets = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        match metric_set_from(entry) {
            Some(set) => sets.push(set),
            None => warn!("Discarding metric entry {} without fields", idx),
        }
    }
    Ok(sets)
}

fn metric_set_from(entry: &Value) -> Option<MetricSet> {
    let obj = entry.as_object()?;
    let fiscal_year = obj.get("fiscal_year").and_then(scalar_string);
    let quarter = obj.get("quarter").and_then(scalar_string);

    let fields: BTreeMap<String, Value> = match obj.get("metrics") {
        Some(Value::Object(metrics)) => collect_fields(metrics, &[]),
        _ => collect_fields(obj, &["fiscal_year", "quarter", "period"]),
    };
    if fields.is_empty() {
        return None;
    }
    Some(MetricSet {
        fiscal_year,
        quarter,
        fields,
    })
}

fn collect_fields(obj: &Map<String, Value>, skip: &[&str]) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(name, value)| !skip.contains(&name.as_str()) && !value.is_null())
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| (name.trim().to_string(), value.clone()))
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a clause classification answer
///
/// Plain text ("Critical", "Classification: Important") or JSON
/// `{"classification": "..."}` are both accepted.
pub fn parse_clause_label(response: &str) -> Result<ClauseLabel, String> {
    if let Ok(Value::Object(obj)) = parse_value(response) {
        let named = ["classification", "label"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str));
        if let Some(label) = named {
            return ClauseLabel::parse(label)
                .or_else(|| ClauseLabel::find_in(label))
                .ok_or_else(|| format!("Unknown label '{}'", label));
        }
    }
    ClauseLabel::find_in(response).ok_or_else(|| "No label in response".to_string())
}

/// Parse a metric classification answer into per-field labels
pub fn parse_metric_labels(response: &str) -> Result<BTreeMap<String, MetricLabel>, String> {
    let mut obj = match parse_value(response)? {
        Value::Object(obj) => obj,
        _ => return Err("Expected a JSON object".to_string()),
    };
    if let Some(Value::Object(inner)) = obj.remove("classifications") {
        obj = inner;
    }

    let labels: BTreeMap<String, MetricLabel> = obj
        .into_iter()
        .filter_map(|(field, value)| {
            let label = match value {
                Value::String(label) => MetricLabel {
                    label,
                    reason: String::new(),
                },
                Value::Object(_) => serde_json::from_value::<MetricLabel>(value).ok()?,
                _ => return None,
            };
            (!label.label.trim().is_empty()).then_some((field, label))
        })
        .collect();

    if labels.is_empty() {
        return Err("No field labels in response".to_string());
    }
    Ok(labels)
}

/// One evaluator verdict on a variant
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Evaluation {
    /// Zero-based variant index
    pub index: usize,
    /// Wording similarity to the original
    #[serde(default)]
    pub similarity_score: f64,
    /// Meaning preservation
    #[serde(default)]
    pub legal_score: f64,
    /// Evaluator's keep decision
    #[serde(default)]
    pub should_keep: bool,
    /// Evaluator's reason
    #[serde(default)]
    pub reason: String,
}

/// Parse an evaluation answer
///
/// Entries that do not deserialize are skipped, but an answer where none of
/// them do is an error.
pub fn parse_evaluations(response: &str) -> Result<Vec<Evaluation>, String> {
    let entries = match parse_value(response)? {
        Value::Object(mut obj) => match obj.remove("evaluations") {
            Some(Value::Array(entries)) => entries,
            _ => return Err("Expected an 'evaluations' array".to_string()),
        },
        Value::Array(entries) => entries,
        _ => return Err("Expected a JSON object".to_string()),
    };

    let returned = entries.len();
    let mut evaluations = Vec::with_capacity(returned);
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Evaluation>(entry) {
            Ok(mut evaluation) => {
                evaluation.similarity_score = evaluation.similarity_score.clamp(0.0, 1.0);
                evaluation.legal_score = evaluation.legal_score.clamp(0.0, 1.0);
                evaluations.push(evaluation);
            }
            Err(e) => warn!("Failed to parse evaluation {}: {}", idx, e),
        }
    }
    if returned > 0 && evaluations.is_empty() {
        return Err(format!("None of the {} evaluations could be parsed", returned));
    }
    Ok(evaluations)
}

/// Parse a projection answer; any JSON object is accepted
pub fn parse_projection(response: &str) -> Result<Value, String> {
    match parse_value(response)? {
        value @ Value::Object(_) => Ok(value),
        _ => Err("Expected a JSON object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_code_block() {
        let response = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_after_prose() {
        let response = "Here you go: {\"a\": [1, 2]} hope that helps";
        assert_eq!(extract_json(response).unwrap(), "{\"a\": [1, 2]}");
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_parse_metric_sets_wrapped() {
        let response = r#"{"metrics": [
            {"fiscal_year": 2023, "quarter": "Q2", "metrics": {"revenue": 1200, "operating_margin": "18%"}},
            {"fiscal_year": "2023", "metrics": {}}
        ]}"#;
        let sets = parse_metric_sets(response).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].fiscal_year.as_deref(), Some("2023"));
        assert_eq!(sets[0].quarter.as_deref(), Some("Q2"));
        assert_eq!(sets[0].fields.len(), 2);
    }

    #[test]
    fn test_parse_metric_sets_bare_array_flat_entry() {
        let response = r#"[{"quarter": "Q4", "net_income": "3.1M", "eps": null}]"#;
        let sets = parse_metric_sets(response).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].field_names().collect::<Vec<_>>(), vec!["net_income"]);
    }

    #[test]
    fn test_parse_metric_sets_rejects_text() {
        assert!(parse_metric_sets("Revenue was up").is_err());
        assert!(parse_metric_sets(r#"{"other": 1}"#).is_err());
    }

    #[test]
    fn test_parse_clause_label_forms() {
        assert_eq!(parse_clause_label("Critical").unwrap(), ClauseLabel::Critical);
        assert_eq!(
            parse_clause_label("Classification: important.").unwrap(),
            ClauseLabel::Important
        );
        assert_eq!(
            parse_clause_label(r#"{"classification": "Standard"}"#).unwrap(),
            ClauseLabel::Standard
        );
        assert_eq!(
            parse_clause_label("Not critical; Standard").unwrap(),
            ClauseLabel::Standard
        );
        assert!(parse_clause_label("no idea").is_err());
    }

    #[test]
    fn test_parse_metric_labels_wrapped_and_plain() {
        let wrapped = r#"{"classifications": {"revenue": {"label": "Critical", "reason": "top line"}}}"#;
        let labels = parse_metric_labels(wrapped).unwrap();
        assert_eq!(labels["revenue"].label, "Critical");
        assert_eq!(labels["revenue"].reason, "top line");

        let plain = r#"{"revenue": "Important", "eps": {"label": "Standard"}}"#;
        let labels = parse_metric_labels(plain).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["eps"].reason, "");

        assert!(parse_metric_labels("{}").is_err());
    }

    #[test]
    fn test_parse_evaluations_clamps_scores() {
        let response = r#"{"evaluations": [
            {"index": 0, "similarity_score": 1.4, "legal_score": 0.9, "should_keep": true, "reason": "ok"},
            {"index": "x"},
            {"index": 2, "should_keep": false}
        ]}"#;
        let evaluations = parse_evaluations(response).unwrap();
        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].similarity_score, 1.0);
        assert!(!evaluations[1].should_keep);
        assert!(parse_evaluations(r#"{"verdicts": []}"#).is_err());
    }

    #[test]
    fn test_parse_evaluations_rejects_unusable_entries() {
        let response = r#"{"evaluations": [
            {"variant": 1, "should_keep": true},
            {"variant": 2, "should_keep": true}
        ]}"#;
        assert!(parse_evaluations(response).is_err());
        assert!(parse_evaluations(r#"{"evaluations": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_projection() {
        assert!(parse_projection(r#"{"period": "Q3"}"#).is_ok());
        assert!(parse_projection("[1, 2]").is_err());
    }
}
