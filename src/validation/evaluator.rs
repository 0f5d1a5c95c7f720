//! Field Validity Evaluator
//!
//! Rules produce per-constraint results.
//! The evaluator aggregates them into one verdict per field.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ValidationConfig;
use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constraint {
    Required,
    Pattern,
    Min,
    Max,
    MinLength,
}

impl Constraint {
    /// Field attribute declaring this constraint.
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Pattern => "pattern",
            Self::Min => "min",
            Self::Max => "max",
            Self::MinLength => "minlength",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintResult {
    pub constraint: Constraint,
    pub is_empty: bool,
    pub is_invalid: bool,
}

impl ConstraintResult {
    fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            is_empty: false,
            is_invalid: false,
        }
    }
}

/// Aggregated verdict for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidity {
    #[serde(skip)]
    pub field: NodeId,
    pub field_id: String,
    pub results: Vec<ConstraintResult>,
    pub is_empty: bool,
    pub is_invalid: bool,
    pub has_error: bool,
    pub message: String,
}

/// Constraint rule trait - checks one attribute against a value
pub trait ConstraintRule {
    fn constraint(&self) -> Constraint;

    /// `None` when the attribute cannot be interpreted; the constraint is then
    /// treated as absent.
    fn check(&self, value: &str, attribute: &str) -> Option<ConstraintResult>;
}

// --- Concrete Rules ---

pub struct RequiredRule;

impl ConstraintRule for RequiredRule {
    fn constraint(&self) -> Constraint { Constraint::Required }

    fn check(&self, value: &str, _attribute: &str) -> Option<ConstraintResult> {
        let mut result = ConstraintResult::new(self.constraint());
        // Whitespace counts as a value
        result.is_empty = value.is_empty();
        Some(result)
    }
}

pub struct PatternRule;

impl ConstraintRule for PatternRule {
    fn constraint(&self) -> Constraint { Constraint::Pattern }

    fn check(&self, value: &str, attribute: &str) -> Option<ConstraintResult> {
        let regex = match Regex::new(&format!("^(?:{})$", attribute)) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern = attribute, error = %e, "ignoring uncompilable pattern");
                return None;
            }
        };
        let mut result = ConstraintResult::new(self.constraint());
        result.is_invalid = !regex.is_match(value);
        Some(result)
    }
}

pub struct MinRule;

impl ConstraintRule for MinRule {
    fn constraint(&self) -> Constraint { Constraint::Min }

    fn check(&self, value: &str, attribute: &str) -> Option<ConstraintResult> {
        let mut result = ConstraintResult::new(self.constraint());
        result.is_invalid = match (js_number(value), js_number(attribute)) {
            (Some(n), Some(min)) => n < min,
            _ => true,
        };
        Some(result)
    }
}

pub struct MaxRule;

impl ConstraintRule for MaxRule {
    fn constraint(&self) -> Constraint { Constraint::Max }

    fn check(&self, value: &str, attribute: &str) -> Option<ConstraintResult> {
        let mut result = ConstraintResult::new(self.constraint());
        result.is_invalid = match (js_number(value), js_number(attribute)) {
            (Some(n), Some(max)) => n > max,
            _ => true,
        };
        Some(result)
    }
}

pub struct MinLengthRule;

impl ConstraintRule for MinLengthRule {
    fn constraint(&self) -> Constraint { Constraint::MinLength }

    fn check(&self, value: &str, attribute: &str) -> Option<ConstraintResult> {
        let min_length: usize = match attribute.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                warn!(minlength = attribute, "ignoring unparsable minlength");
                return None;
            }
        };
        let length = value.encode_utf16().count();
        let mut result = ConstraintResult::new(self.constraint());
        // Zero length is reported as empty by `required`, not as too short
        result.is_invalid = length > 0 && length < min_length;
        Some(result)
    }
}

/// Numeric coercion with JavaScript `Number()` semantics.
pub fn js_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix(&s[2..], radix);
    }
    // Rust accepts spellings of inf/NaN that Number() rejects
    let lower = s.to_ascii_lowercase();
    if lower.contains("inf") || lower.contains("nan") {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| !n.is_nan())
}

// Unsigned digits only; accumulates in f64 so values past u64 stay finite
fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

/// Evaluator runs every declared constraint and aggregates the results
pub struct Evaluator {
    rules: Vec<Box<dyn ConstraintRule>>,
    attribute_empty: String,
    attribute_invalid: String,
}

impl Evaluator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            rules: vec![
                Box::new(RequiredRule),
                Box::new(PatternRule),
                Box::new(MinRule),
                Box::new(MaxRule),
                Box::new(MinLengthRule),
            ],
            attribute_empty: config.attribute_empty.clone(),
            attribute_invalid: config.attribute_invalid.clone(),
        }
    }

    pub fn evaluate(&self, doc: &Document, field: NodeId) -> FieldValidity {
        let value = doc.value(field);
        let mut results = vec![];

        for rule in &self.rules {
            let constraint = rule.constraint();
            let Some(attribute) = doc.attr(field, constraint.attribute()) else {
                continue;
            };
            // `required` is boolean; the others need a value to mean anything
            if attribute.is_empty() && constraint != Constraint::Required {
                continue;
            }
            results.extend(rule.check(&value, attribute));
        }

        let is_empty = results.iter().any(|r| r.is_empty);
        let is_invalid = results.iter().any(|r| r.is_invalid);

        let message_attr = |name: &str| {
            doc.attr(field, name)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
        };
        let mut message = String::new();
        if is_invalid {
            message = message_attr(&self.attribute_invalid)
                .or_else(|| message_attr(&self.attribute_empty))
                .unwrap_or_default();
        }
        // Empty wins over invalid
        if is_empty {
            message = message_attr(&self.attribute_empty).unwrap_or_default();
        }

        FieldValidity {
            field,
            field_id: doc.attr(field, "id").unwrap_or_default().to_string(),
            results,
            is_empty,
            is_invalid,
            has_error: is_empty || is_invalid,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(markup: &str, value: &str) -> FieldValidity {
        let mut doc = Document::parse(markup);
        let field = doc.element_by_id("input").unwrap();
        doc.set_value(field, value);
        Evaluator::new(&ValidationConfig::default()).evaluate(&doc, field)
    }

    const MESSAGES: &str =
        r#"data-dough-validation-empty="Please fill in" data-dough-validation-invalid="Not valid""#;

    #[test]
    fn test_required_empty() {
        let v = evaluate(&format!(r#"<input id="input" required {}>"#, MESSAGES), "");
        assert!(v.has_error);
        assert!(v.is_empty);
        assert!(!v.is_invalid);
        assert_eq!(v.message, "Please fill in");
        assert_eq!(v.results.len(), 1);
    }

    #[test]
    fn test_required_whitespace_is_not_empty() {
        let v = evaluate(r#"<input id="input" required>"#, "  ");
        assert!(!v.has_error);
    }

    #[test]
    fn test_absent_constraints_produce_no_results() {
        let v = evaluate(r#"<input id="input" pattern="" min="">"#, "");
        assert!(v.results.is_empty());
        assert!(!v.has_error);
    }

    #[test]
    fn test_minlength_boundaries() {
        let markup = format!(r#"<input id="input" minlength="4" {}>"#, MESSAGES);
        assert!(evaluate(&markup, "te").is_invalid);
        assert_eq!(evaluate(&markup, "te").message, "Not valid");
        assert!(!evaluate(&markup, "").has_error);
        assert!(!evaluate(&markup, "test").has_error);
    }

    #[test]
    fn test_minlength_counts_utf16_units() {
        let markup = r#"<input id="input" minlength="2">"#;
        // One astral character is two UTF-16 code units
        assert!(!evaluate(markup, "😀").has_error);
        assert!(evaluate(markup, "é").is_invalid);
    }

    #[test]
    fn test_pattern_is_full_match() {
        let markup = r#"<input id="input" pattern="[a-z]+@[a-z]+\.com">"#;
        assert!(evaluate(markup, "test").is_invalid);
        assert!(evaluate(markup, "xtest@tested.com!").is_invalid);
        assert!(!evaluate(markup, "test@tested.com").has_error);
    }

    #[test]
    fn test_uncompilable_pattern_is_ignored() {
        let v = evaluate(r#"<input id="input" pattern="(unclosed">"#, "anything");
        assert!(v.results.is_empty());
        assert!(!v.has_error);
    }

    #[test]
    fn test_number_range() {
        let markup = r#"<input id="input" min="1" max="5">"#;
        assert!(evaluate(markup, "6").is_invalid);
        assert!(evaluate(markup, "0").is_invalid);
        assert!(evaluate(markup, "test").is_invalid);
        assert!(!evaluate(markup, "3").has_error);
        assert!(!evaluate(markup, "1").has_error);
        assert!(!evaluate(markup, "5").has_error);

        let not_a_number = evaluate(markup, "test");
        assert!(not_a_number.results.iter().all(|r| r.is_invalid));
    }

    #[test]
    fn test_non_numeric_bound_is_invalid() {
        assert!(evaluate(r#"<input id="input" min="low">"#, "3").is_invalid);
    }

    #[test]
    fn test_js_number() {
        assert_eq!(js_number(""), Some(0.0));
        assert_eq!(js_number(" 3 "), Some(3.0));
        assert_eq!(js_number("1e2"), Some(100.0));
        assert_eq!(js_number("0x1F"), Some(31.0));
        assert_eq!(js_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(js_number("inf"), None);
        assert_eq!(js_number("NaN"), None);
        assert_eq!(js_number("3px"), None);
    }

    #[test]
    fn test_js_number_prefixed_literals() {
        assert_eq!(js_number("0b101"), Some(5.0));
        assert_eq!(js_number("0O17"), Some(15.0));
        assert_eq!(js_number("0x"), None);
        assert_eq!(js_number("0x+1"), None);
        assert_eq!(js_number("0x-1"), None);
        assert_eq!(js_number("-0x1"), None);
        assert_eq!(js_number("0b2"), None);
        // Past u64::MAX the value is still a finite number
        assert_eq!(js_number("0xFFFFFFFFFFFFFFFFF"), Some(2f64.powi(68)));
    }

    #[test]
    fn test_empty_message_wins() {
        // Empty value with required + min: both flags set
        let markup = format!(r#"<input id="input" required min="1" {}>"#, MESSAGES);
        let v = evaluate(&markup, "");
        assert!(v.is_empty);
        assert!(v.is_invalid);
        assert_eq!(v.message, "Please fill in");
    }

    #[test]
    fn test_message_fallbacks() {
        let only_empty = r#"<input id="input" minlength="3" data-dough-validation-empty="Fill">"#;
        assert_eq!(evaluate(only_empty, "a").message, "Fill");

        let blank_invalid =
            r#"<input id="input" minlength="3" data-dough-validation-invalid="" data-dough-validation-empty="Fill">"#;
        assert_eq!(evaluate(blank_invalid, "a").message, "Fill");

        let none = r#"<input id="input" required>"#;
        let v = evaluate(none, "");
        assert!(v.has_error);
        assert_eq!(v.message, "");
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut doc = Document::parse(r#"<input id="input" required minlength="3">"#);
        let field = doc.element_by_id("input").unwrap();
        doc.set_value(field, "ab");
        let evaluator = Evaluator::new(&ValidationConfig::default());
        assert_eq!(evaluator.evaluate(&doc, field), evaluator.evaluate(&doc, field));
    }
}
