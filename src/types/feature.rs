//! Raw feature inputs for a single classification example

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw feature value: numeric scalar or categorical string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{}", v),
            FeatureValue::Category(s) => write!(f, "{}", s),
        }
    }
}

/// Ordered mapping from feature name to raw value.
///
/// Order follows insertion. The set must contain exactly the input names the
/// loaded model declares; the encoder rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureSet {
    /// Create an empty feature set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric feature (builder style).
    pub fn with_number(mut self, name: &str, value: f64) -> Self {
        self.insert(name, FeatureValue::Number(value));
        self
    }

    /// Add a categorical feature (builder style).
    pub fn with_category(mut self, name: &str, value: &str) -> Self {
        self.insert(name, FeatureValue::Category(value.to_string()));
        self
    }

    /// Insert or replace a feature value.
    pub fn insert(&mut self, name: &str, value: FeatureValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Look up a feature value by name.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate name/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of features in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
