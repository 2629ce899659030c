//! Outcome and judge heuristics over raw judgment text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Characters from the end of the document searched for the disposition.
const OUTCOME_WINDOW_CHARS: usize = 2500;
/// Characters from the start of the document searched for the bench.
const JUDGE_WINDOW_CHARS: usize = 2000;

static OUTCOME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:appeal|petition|suit)\s+is\s+(?:dismissed|allowed|partly allowed)")
        .expect("outcome regex is valid")
});
static JUDGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bJustice\s+[A-Z][a-z]+\s+[A-Z][a-z]+").expect("judge regex is valid")
});

/// Structured fields pulled from a judgment without any model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInfo {
    /// Disposition phrase such as "appeal is dismissed".
    pub outcome: Option<String>,
    /// Name of the first judge mentioned, e.g. "Justice Ravi Kumar".
    pub judge: Option<String>,
}

/// Extract the outcome from the tail of the text and the judge from its head.
pub fn extract_decision(text: &str) -> DecisionInfo {
    let outcome = OUTCOME_RE
        .find(tail_chars(text, OUTCOME_WINDOW_CHARS))
        .map(|found| found.as_str().trim().to_string());
    let judge = JUDGE_RE
        .find(head_chars(text, JUDGE_WINDOW_CHARS))
        .map(|found| found.as_str().trim().to_string());
    DecisionInfo { outcome, judge }
}

fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_is_found_near_the_end() {
        let text = format!(
            "{} For the reasons above, the appeal is dismissed with costs.",
            "Background facts. ".repeat(40)
        );
        let info = extract_decision(&text);
        assert_eq!(info.outcome.as_deref(), Some("appeal is dismissed"));
    }

    #[test]
    fn outcome_match_ignores_case_and_keeps_original_text() {
        let info = extract_decision("Accordingly the Petition IS Partly Allowed.");
        assert_eq!(info.outcome.as_deref(), Some("Petition IS Partly Allowed"));
    }

    #[test]
    fn outcome_outside_the_tail_window_is_ignored() {
        let text = format!("The suit is allowed. {}", "x".repeat(3000));
        assert_eq!(extract_decision(&text).outcome, None);
    }

    #[test]
    fn judge_is_found_near_the_start() {
        let info = extract_decision("Before Justice Ravi Kumar held that the lease was void.");
        assert_eq!(info.judge.as_deref(), Some("Justice Ravi Kumar"));
    }

    #[test]
    fn judge_requires_two_capitalized_names_in_the_head_window() {
        assert_eq!(extract_decision("justice ravi kumar").judge, None);
        let late = format!("{} Justice Ravi Kumar", "y".repeat(2100));
        assert_eq!(extract_decision(&late).judge, None);
    }

    #[test]
    fn windows_respect_multibyte_boundaries() {
        let text = "é".repeat(3000);
        assert_eq!(tail_chars(&text, 2500).chars().count(), 2500);
        assert_eq!(head_chars(&text, 2000).chars().count(), 2000);
        assert_eq!(tail_chars("short", 2500), "short");
    }
}
