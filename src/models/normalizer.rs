//! Output normalization: backend-native result shapes to canonical predictions
//!
//! Different inference backends and export pipelines disagree on how to
//! represent a per-class probability output (tensor, nested map, sparse
//! class-to-score map, or a singleton list wrapping any of those). This module
//! centralizes every known shape variant behind one ordered-rule dispatch so
//! callers never branch on backend identity.

use crate::error::PredictError;
use crate::types::prediction::{Label, Prediction, CLASS_COUNT};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Key of a class-indexed probability map entry. Backends emit either integer
/// class ids or their string forms.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassKey {
    Int(i64),
    Text(String),
}

/// Probability map keyed by class index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMap {
    entries: Vec<(ClassKey, f64)>,
}

impl ClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ClassKey, probability: f64) {
        self.entries.push((key, probability));
    }

    /// Look up the probability for a class index, accepting integer keys and
    /// their string forms interchangeably.
    pub fn get(&self, class: i64) -> Option<f64> {
        self.entries.iter().find_map(|(key, value)| match key {
            ClassKey::Int(k) if *k == class => Some(*value),
            ClassKey::Text(k) if *k == class.to_string() => Some(*value),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluator result object: a predicted label together with the value its
/// probability payload hides behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    result: Label,
    value: Box<RawValue>,
}

impl Distribution {
    pub fn new(result: Label, value: RawValue) -> Self {
        Self {
            result,
            value: Box::new(value),
        }
    }

    /// The winning class label.
    pub fn result(&self) -> &Label {
        &self.result
    }

    /// The wrapped probability payload.
    pub fn value(&self) -> &RawValue {
        &self.value
    }
}

/// Backend-native result value. Opaque outside this module: adapters build
/// these, the normalizer interprets them, nothing else looks inside.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// 64-bit integer tensor data (label outputs).
    Int64s(Vec<i64>),
    /// Row-major 2-D f32 array.
    FloatMatrix(Vec<Vec<f32>>),
    /// Row-major 2-D f64 array.
    DoubleMatrix(Vec<Vec<f64>>),
    /// Flat f32 array.
    FloatRow(Vec<f32>),
    /// Flat f64 array.
    DoubleRow(Vec<f64>),
    /// Class-index-keyed probability map.
    ClassMap(ClassMap),
    /// Ordered sequence of nested values.
    Sequence(Vec<RawValue>),
    /// Evaluator result wrapping a label and a probability payload.
    Distribution(Distribution),
}

/// One inference call's raw result: output name to value, plus the output
/// names the adapter resolved for label and (optionally) probabilities.
#[derive(Debug, Clone)]
pub struct RawOutput {
    values: HashMap<String, RawValue>,
    label_output: String,
    prob_output: Option<String>,
}

impl RawOutput {
    pub fn new(label_output: String, prob_output: Option<String>) -> Self {
        Self {
            values: HashMap::new(),
            label_output,
            prob_output,
        }
    }

    pub fn insert(&mut self, name: String, value: RawValue) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    pub fn label_output(&self) -> &str {
        &self.label_output
    }

    pub fn prob_output(&self) -> Option<&str> {
        self.prob_output.as_deref()
    }
}

/// Recognized probability output shapes, in match priority order. The order
/// is load-bearing: a wrapped distribution may itself contain a nested array,
/// so wrappers are peeled before anything else is considered.
#[derive(Debug)]
enum ProbShape<'a> {
    /// A distribution whose value accessor yields the real payload.
    Wrapped(&'a RawValue),
    /// A 2-D numeric array; row 0 carries the per-class vector.
    RectangularArray(RowRef<'a>),
    /// A mapping keyed by class index (integer or string form).
    ClassIndexMap(&'a ClassMap),
    /// A non-empty sequence; only its first element is ever read.
    WrappedSingleton(&'a RawValue),
    Unrecognized,
}

#[derive(Debug)]
enum RowRef<'a> {
    Float(&'a [f32]),
    Double(&'a [f64]),
}

impl RowRef<'_> {
    fn to_f32(&self) -> Vec<f32> {
        match self {
            RowRef::Float(row) => row.to_vec(),
            // Narrowing is expected: the canonical vector is single precision.
            RowRef::Double(row) => row.iter().map(|&v| v as f32).collect(),
        }
    }
}

fn classify(value: &RawValue) -> ProbShape<'_> {
    match value {
        RawValue::Distribution(dist) => ProbShape::Wrapped(dist.value()),
        RawValue::FloatMatrix(rows) if !rows.is_empty() => {
            ProbShape::RectangularArray(RowRef::Float(&rows[0]))
        }
        RawValue::DoubleMatrix(rows) if !rows.is_empty() => {
            ProbShape::RectangularArray(RowRef::Double(&rows[0]))
        }
        RawValue::ClassMap(map) => ProbShape::ClassIndexMap(map),
        RawValue::Sequence(items) if !items.is_empty() => ProbShape::WrappedSingleton(&items[0]),
        _ => ProbShape::Unrecognized,
    }
}

fn class_vector(map: &ClassMap) -> Vec<f32> {
    // Each class index is looked up independently; a missing key yields NaN
    // at that position instead of failing the whole prediction.
    (0..CLASS_COUNT as i64)
        .map(|class| map.get(class).map(|p| p as f32).unwrap_or(f32::NAN))
        .collect()
}

fn extract(shape: ProbShape<'_>) -> Vec<f32> {
    match shape {
        ProbShape::RectangularArray(row) => row.to_f32(),
        ProbShape::ClassIndexMap(map) => class_vector(map),
        ProbShape::WrappedSingleton(first) => match first {
            RawValue::ClassMap(map) => class_vector(map),
            RawValue::FloatRow(row) => row.clone(),
            RawValue::DoubleRow(row) => row.iter().map(|&v| v as f32).collect(),
            _ => Vec::new(),
        },
        ProbShape::Wrapped(_) | ProbShape::Unrecognized => Vec::new(),
    }
}

/// Interpret a raw probability value through the ordered shape rules.
///
/// Total: every shape yields a vector, possibly empty. A wrapper is unwrapped
/// exactly one level; whatever it exposes is re-classified against the
/// non-wrapper rules only.
pub fn probability_vector(value: &RawValue) -> Vec<f32> {
    match classify(value) {
        ProbShape::Wrapped(inner) => match classify(inner) {
            ProbShape::Wrapped(_) => Vec::new(),
            shape => extract(shape),
        },
        shape => extract(shape),
    }
}

fn extract_label(raw: &RawOutput) -> Result<Label, PredictError> {
    let missing = || PredictError::MissingLabelOutput {
        name: raw.label_output.clone(),
    };
    let value = raw.values.get(&raw.label_output).ok_or_else(missing)?;
    match value {
        RawValue::Int64s(data) => data.first().map(|&v| Label::Int(v)).ok_or_else(missing),
        RawValue::Distribution(dist) => Ok(dist.result().clone()),
        other => {
            debug!(shape = ?other, "Label output carries no label-bearing shape");
            Err(missing())
        }
    }
}

/// Map a raw backend result into the canonical prediction record.
///
/// The label is mandatory; probabilities are best effort. A result whose
/// probability output was never resolved yields `has_probabilities = false`;
/// one whose probability shape is unrecognized keeps the flag set but carries
/// an empty vector.
pub fn normalize(raw: &RawOutput) -> Result<Prediction, PredictError> {
    let label = extract_label(raw)?;

    let Some(prob_name) = raw.prob_output.as_deref() else {
        return Ok(Prediction::without_probabilities(label));
    };

    let probabilities = match raw.values.get(prob_name) {
        Some(value) => probability_vector(value),
        None => {
            debug!(output = prob_name, "Resolved probability output absent from result");
            Vec::new()
        }
    };

    if probabilities.is_empty() {
        warn!(
            output = prob_name,
            "Probability shape not recognized, returning degenerate vector"
        );
    }

    Ok(Prediction::with_probabilities(label, probabilities))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_probability(value: RawValue) -> RawOutput {
        let mut raw = RawOutput::new(
            "output_label".to_string(),
            Some("output_probability".to_string()),
        );
        raw.insert("output_label".to_string(), RawValue::Int64s(vec![0]));
        raw.insert("output_probability".to_string(), value);
        raw
    }

    fn class_map(pairs: &[(i64, f64)]) -> ClassMap {
        let mut map = ClassMap::new();
        for &(class, probability) in pairs {
            map.insert(ClassKey::Int(class), probability);
        }
        map
    }

    #[test]
    fn test_class_map_ordered_by_class_index() {
        let raw = raw_with_probability(RawValue::ClassMap(class_map(&[(0, 0.7), (1, 0.3)])));

        let prediction = normalize(&raw).unwrap();

        assert!(prediction.has_probabilities);
        assert_eq!(prediction.probabilities, vec![0.7, 0.3]);
    }

    #[test]
    fn test_class_map_missing_key_yields_nan() {
        let raw = raw_with_probability(RawValue::ClassMap(class_map(&[(0, 0.7)])));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities.len(), 2);
        assert_eq!(prediction.probabilities[0], 0.7);
        assert!(prediction.probabilities[1].is_nan());
    }

    #[test]
    fn test_class_map_with_string_keys() {
        let mut map = ClassMap::new();
        map.insert(ClassKey::Text("0".to_string()), 0.2);
        map.insert(ClassKey::Text("1".to_string()), 0.8);
        let raw = raw_with_probability(RawValue::ClassMap(map));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.2, 0.8]);
    }

    #[test]
    fn test_rectangular_array_takes_row_zero() {
        let raw = raw_with_probability(RawValue::FloatMatrix(vec![
            vec![0.6, 0.4],
            vec![0.1, 0.9],
        ]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.6, 0.4]);
    }

    #[test]
    fn test_double_matrix_narrows_to_f32() {
        let raw = raw_with_probability(RawValue::DoubleMatrix(vec![vec![0.25, 0.75]]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.25_f32, 0.75_f32]);
    }

    #[test]
    fn test_sequence_of_maps_uses_first_only() {
        let raw = raw_with_probability(RawValue::Sequence(vec![
            RawValue::ClassMap(class_map(&[(0, 0.55), (1, 0.45)])),
            RawValue::ClassMap(class_map(&[(0, 0.1), (1, 0.9)])),
        ]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.55, 0.45]);
    }

    #[test]
    fn test_sequence_of_flat_arrays() {
        let raw = raw_with_probability(RawValue::Sequence(vec![RawValue::FloatRow(vec![
            0.55, 0.45,
        ])]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.55, 0.45]);
    }

    #[test]
    fn test_sequence_of_double_rows_narrows() {
        let raw = raw_with_probability(RawValue::Sequence(vec![RawValue::DoubleRow(vec![
            0.3, 0.7,
        ])]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.3_f32, 0.7_f32]);
    }

    #[test]
    fn test_wrapped_distribution_unwraps_one_level() {
        let dist = Distribution::new(
            Label::Int(1),
            RawValue::ClassMap(class_map(&[(0, 0.09), (1, 0.91)])),
        );
        let raw = raw_with_probability(RawValue::Distribution(dist));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.09, 0.91]);
    }

    #[test]
    fn test_wrapped_matrix_reclassified_as_rectangular() {
        let dist = Distribution::new(Label::Int(0), RawValue::FloatMatrix(vec![vec![0.8, 0.2]]));
        let raw = raw_with_probability(RawValue::Distribution(dist));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.probabilities, vec![0.8, 0.2]);
    }

    #[test]
    fn test_doubly_wrapped_distribution_degrades() {
        let inner = Distribution::new(
            Label::Int(0),
            RawValue::ClassMap(class_map(&[(0, 0.5), (1, 0.5)])),
        );
        let outer = Distribution::new(Label::Int(0), RawValue::Distribution(inner));
        let raw = raw_with_probability(RawValue::Distribution(outer));

        let prediction = normalize(&raw).unwrap();

        assert!(prediction.has_probabilities);
        assert!(prediction.probabilities.is_empty());
    }

    #[test]
    fn test_unrecognized_shape_keeps_flag_with_empty_vector() {
        // A bare flat array matches no rule at the top level.
        let raw = raw_with_probability(RawValue::FloatRow(vec![0.5, 0.5]));

        let prediction = normalize(&raw).unwrap();

        assert!(prediction.has_probabilities);
        assert!(prediction.probabilities.is_empty());
    }

    #[test]
    fn test_empty_sequence_is_unrecognized() {
        let raw = raw_with_probability(RawValue::Sequence(Vec::new()));

        let prediction = normalize(&raw).unwrap();

        assert!(prediction.probabilities.is_empty());
    }

    #[test]
    fn test_unresolved_probability_output() {
        let mut raw = RawOutput::new("output_label".to_string(), None);
        raw.insert("output_label".to_string(), RawValue::Int64s(vec![1]));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.label, Label::Int(1));
        assert!(!prediction.has_probabilities);
        assert!(prediction.probabilities.is_empty());
    }

    #[test]
    fn test_probability_value_absent_from_result() {
        let mut raw = RawOutput::new(
            "output_label".to_string(),
            Some("output_probability".to_string()),
        );
        raw.insert("output_label".to_string(), RawValue::Int64s(vec![0]));

        let prediction = normalize(&raw).unwrap();

        assert!(prediction.has_probabilities);
        assert!(prediction.probabilities.is_empty());
    }

    #[test]
    fn test_missing_label_output_is_fatal() {
        let raw = RawOutput::new("output_label".to_string(), None);

        let err = normalize(&raw).unwrap_err();

        assert!(matches!(
            err,
            PredictError::MissingLabelOutput { ref name } if name == "output_label"
        ));
    }

    #[test]
    fn test_empty_label_tensor_is_fatal() {
        let mut raw = RawOutput::new("output_label".to_string(), None);
        raw.insert("output_label".to_string(), RawValue::Int64s(Vec::new()));

        assert!(normalize(&raw).is_err());
    }

    #[test]
    fn test_label_from_distribution_result() {
        let dist = Distribution::new(
            Label::Text("Gentoo".to_string()),
            RawValue::ClassMap(class_map(&[(0, 0.05), (1, 0.95)])),
        );
        let mut raw = RawOutput::new("species".to_string(), Some("species".to_string()));
        raw.insert("species".to_string(), RawValue::Distribution(dist));

        let prediction = normalize(&raw).unwrap();

        assert_eq!(prediction.label, Label::Text("Gentoo".to_string()));
        assert_eq!(prediction.probabilities, vec![0.05, 0.95]);
    }
}
