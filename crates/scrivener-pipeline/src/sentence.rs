//! Complete-sentence normalization for extracted items and variants

use regex::Regex;
use std::sync::LazyLock;

/// Sentence end followed by the start of a new sentence
static SENTENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+[A-Z]").expect("valid regex"));

/// Sentence end followed by a lowercase fragment
static DANGLING_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+[a-z]").expect("valid regex"));

/// Bullets, numbered and lettered list markers
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•‣–]\s*|\d{1,3}[.)]\s+|\(?[a-zA-Z0-9]{1,3}\)\s+|#+\s+)")
        .expect("valid regex")
});

/// Turn a model-produced fragment into one complete sentence
///
/// Drops a leading partial sentence when the text starts mid-sentence,
/// drops a trailing lowercase fragment, capitalizes and terminates.
///
/// # Examples
///
/// ```
/// use scrivener_pipeline::sentence::ensure_complete_sentence;
///
/// assert_eq!(
///     ensure_complete_sentence("of the agreement. Payment is due in 30 days"),
///     "Payment is due in 30 days."
/// );
/// assert_eq!(ensure_complete_sentence("  "), "");
/// ```
pub fn ensure_complete_sentence(text: &str) -> String {
    let mut sentence = text.trim();
    if sentence.is_empty() {
        return String::new();
    }

    let starts_lowercase = sentence.chars().next().is_some_and(char::is_lowercase);
    if starts_lowercase && !(sentence.starts_with("i ") || sentence.starts_with("i'")) {
        if let Some(boundary) = SENTENCE_START.find(sentence) {
            // The match ends on a one-byte ASCII capital.
            sentence = &sentence[boundary.end() - 1..];
        }
    }

    if let Some(fragment) = DANGLING_FRAGMENT.find_iter(sentence).last() {
        sentence = &sentence[..fragment.start() + 1];
    }

    let sentence = sentence.trim().trim_end_matches([',', ';', ':']).trim_end();
    if sentence.is_empty() {
        return String::new();
    }

    let mut chars = sentence.chars();
    let mut normalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    if !normalized.ends_with(['.', '!', '?']) {
        normalized.push('.');
    }
    normalized
}

/// Strip list markers and surrounding quotes from one response line
pub fn clean_line(line: &str) -> &str {
    let without_marker = match LIST_MARKER.find(line) {
        Some(marker) => &line[marker.end()..],
        None => line,
    };
    without_marker
        .trim()
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
}

/// Lines of a response as complete sentences within `[min_len, max_len]` characters
pub fn sentences_from_lines(response: &str, min_len: usize, max_len: usize) -> Vec<String> {
    response
        .lines()
        .map(clean_line)
        .filter(|line| {
            let len = line.chars().count();
            len > 0 && len >= min_len && len <= max_len
        })
        .map(ensure_complete_sentence)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capitalizes_and_terminates() {
        assert_eq!(
            ensure_complete_sentence("pay within 30 days"),
            "Pay within 30 days."
        );
        assert_eq!(ensure_complete_sentence("Is this binding?"), "Is this binding?");
    }

    #[test]
    fn test_drops_leading_fragment() {
        assert_eq!(
            ensure_complete_sentence("and conditions herein. The Supplier shall deliver goods."),
            "The Supplier shall deliver goods."
        );
    }

    #[test]
    fn test_keeps_leading_first_person() {
        assert_eq!(
            ensure_complete_sentence("i agree to the terms. Both parties sign."),
            "I agree to the terms. Both parties sign."
        );
    }

    #[test]
    fn test_drops_dangling_fragment() {
        assert_eq!(
            ensure_complete_sentence("Fees are payable monthly. and the remain"),
            "Fees are payable monthly."
        );
    }

    #[test]
    fn test_trailing_separator_replaced() {
        assert_eq!(
            ensure_complete_sentence("The term is twelve months,"),
            "The term is twelve months."
        );
    }

    #[test]
    fn test_clean_line_markers() {
        assert_eq!(clean_line("- Payment is due."), "Payment is due.");
        assert_eq!(clean_line("12. Payment is due."), "Payment is due.");
        assert_eq!(clean_line("(a) Payment is due."), "Payment is due.");
        assert_eq!(clean_line("\"Payment is due.\""), "Payment is due.");
        assert_eq!(clean_line("1.5 million units ship."), "1.5 million units ship.");
    }

    #[test]
    fn test_sentences_from_lines_filters_length() {
        let response = "1. Payment is due within thirty days.\n\n2. Short.\n- the supplier shall indemnify the buyer";
        let sentences = sentences_from_lines(response, 10, 1000);
        assert_eq!(
            sentences,
            vec![
                "Payment is due within thirty days.".to_string(),
                "The supplier shall indemnify the buyer.".to_string(),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_normalized_is_complete_sentence(text in "[a-zA-Z][a-zA-Z ,.!?]{0,80}") {
            let sentence = ensure_complete_sentence(&text);
            if !sentence.is_empty() {
                let first = sentence.chars().next().unwrap();
                prop_assert!(!first.is_lowercase());
                prop_assert!(sentence.ends_with(['.', '!', '?']));
            }
        }

        #[test]
        fn prop_normalization_is_idempotent(text in "[A-Z][a-z ]{0,40}[.]") {
            let once = ensure_complete_sentence(&text);
            prop_assert_eq!(ensure_complete_sentence(&once), once);
        }
    }
}
