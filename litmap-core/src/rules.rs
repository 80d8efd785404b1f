//! Priority-ordered keyword rule tables.
//!
//! A rule table is a list of `(keyword, label)` pairs scanned in order against
//! lowercase text. [`first_match`] returns the label of the first rule whose
//! keyword occurs in the text; [`all_matches`] collects every hit in table
//! order. Tables live in configuration, so precedence is data.

use serde::{Deserialize, Serialize};

/// A single substring rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Lowercase substring to look for.
    pub keyword: String,
    /// Label emitted on a hit.
    pub label: String,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            label: label.into(),
        }
    }

    /// Whether the rule fires on already-lowercased text.
    pub fn matches(&self, lowered: &str) -> bool {
        !self.keyword.is_empty() && lowered.contains(&self.keyword)
    }
}

/// Label returned when no rule fires.
pub const FALLBACK_LABEL: &str = "Various";

/// Default dominant-method table, highest priority first.
pub fn default_method_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("quantum", "Quantum Computing"),
        KeywordRule::new("transformer", "Vision Transformers"),
        KeywordRule::new("adversarial", "Adversarial Training"),
        KeywordRule::new("smoothing", "Randomized Smoothing"),
        KeywordRule::new("circuit", "Quantum Circuits"),
        KeywordRule::new("algorithm", "Quantum Algorithms"),
        KeywordRule::new("error correction", "Error Correction"),
    ]
}

/// Default dataset table, in output order.
pub fn default_dataset_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new("imagenet", "ImageNet"),
        KeywordRule::new("cifar", "CIFAR"),
        KeywordRule::new("benchmark", "Benchmarks"),
        KeywordRule::new("simulation", "Simulations"),
    ]
}

/// Label of the first rule that fires, if any.
pub fn first_match<'a>(rules: &'a [KeywordRule], lowered: &str) -> Option<&'a str> {
    rules
        .iter()
        .find(|r| r.matches(lowered))
        .map(|r| r.label.as_str())
}

/// Labels of every rule that fires, in table order, without duplicates.
pub fn all_matches(rules: &[KeywordRule], lowered: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for rule in rules.iter().filter(|r| r.matches(lowered)) {
        if !labels.iter().any(|l| l == &rule.label) {
            labels.push(rule.label.clone());
        }
    }
    labels
}
