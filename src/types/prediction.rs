//! Canonical prediction record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of classes in this domain (Adelie = 0, Gentoo = 1).
pub const CLASS_COUNT: usize = 2;

/// Predicted class identifier, preserved exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{}", v),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Backend-agnostic prediction produced by one inference call.
///
/// Immutable once built; owned by the caller that requested it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class label; always present.
    pub label: Label,

    /// Per-class probabilities ordered by class index ascending. Length is
    /// [`CLASS_COUNT`] when a probability output was understood, zero when it
    /// was absent or unrecognized.
    pub probabilities: Vec<f32>,

    /// Whether the backend resolved a probability output at all.
    pub has_probabilities: bool,
}

impl Prediction {
    /// Build a prediction carrying a (possibly degenerate) probability vector.
    pub fn with_probabilities(label: Label, probabilities: Vec<f32>) -> Self {
        Self {
            label,
            probabilities,
            has_probabilities: true,
        }
    }

    /// Build a prediction for a model that exposes no probability output.
    pub fn without_probabilities(label: Label) -> Self {
        Self {
            label,
            probabilities: Vec::new(),
            has_probabilities: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_serialization() {
        let prediction = Prediction::with_probabilities(Label::Int(0), vec![0.91, 0.09]);

        let json = serde_json::to_string(&prediction).unwrap();
        let deserialized: Prediction = serde_json::from_str(&json).unwrap();

        assert_eq!(prediction, deserialized);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::Int(1).to_string(), "1");
        assert_eq!(Label::Text("Gentoo".to_string()).to_string(), "Gentoo");
    }

    #[test]
    fn test_without_probabilities_is_empty() {
        let prediction = Prediction::without_probabilities(Label::Int(0));

        assert!(!prediction.has_probabilities);
        assert!(prediction.probabilities.is_empty());
    }
}
