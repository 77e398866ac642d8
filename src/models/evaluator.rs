//! Distribution-evaluator backend: declarative model documents
//!
//! This backend loads a JSON model document describing a logistic regression
//! over declared input fields (each with its own preparation rule), builds an
//! evaluator, and verifies internal consistency before the first run.
//! Evaluation yields a probability distribution object per target field.

use crate::encoder;
use crate::error::PredictError;
use crate::models::backend::Backend;
use crate::models::normalizer::{ClassKey, ClassMap, Distribution, RawOutput, RawValue};
use crate::types::feature::{FeatureSet, FeatureValue};
use crate::types::prediction::{Label, CLASS_COUNT};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Standardization parameters for a continuous field.
#[derive(Debug, Clone, Deserialize)]
pub struct Scaling {
    pub mean: f64,
    pub std: f64,
}

/// Declared kind and preparation rule of an input field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Continuous {
        #[serde(default)]
        scale: Option<Scaling>,
    },
    Categorical {
        categories: Vec<String>,
    },
}

/// One input field of the data dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct InputField {
    name: String,
    #[serde(flatten)]
    kind: FieldKind,
}

/// A feature value after the field's declared preparation was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedValue {
    Continuous(f64),
    /// Index into the field's declared category list; `None` for a category
    /// the model never saw, which then contributes nothing to the regression.
    Category(Option<usize>),
}

impl InputField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply this field's declared coercion to a raw value.
    pub fn prepare(&self, value: &FeatureValue) -> Result<PreparedValue, PredictError> {
        match (&self.kind, value) {
            (FieldKind::Continuous { scale }, FeatureValue::Number(v)) => {
                let prepared = match scale {
                    Some(s) => (v - s.mean) / s.std,
                    None => *v,
                };
                Ok(PreparedValue::Continuous(prepared))
            }
            (FieldKind::Categorical { categories }, FeatureValue::Category(raw)) => Ok(
                PreparedValue::Category(categories.iter().position(|c| c == raw)),
            ),
            (FieldKind::Continuous { .. }, FeatureValue::Category(_)) => {
                Err(PredictError::InvalidFeatureValue {
                    name: self.name.clone(),
                    expected: "a numeric value",
                })
            }
            (FieldKind::Categorical { .. }, FeatureValue::Number(_)) => {
                Err(PredictError::InvalidFeatureValue {
                    name: self.name.clone(),
                    expected: "a categorical value",
                })
            }
        }
    }
}

/// Target field declaration: output name and class labels by index.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetField {
    pub name: String,
    pub classes: Vec<Label>,
}

/// One regression term: a continuous field, or one category of a categorical
/// field (the field=category indicator).
#[derive(Debug, Clone, Deserialize)]
pub struct Predictor {
    pub field: String,
    #[serde(default)]
    pub category: Option<String>,
    pub coefficient: f64,
}

/// Logistic regression table.
#[derive(Debug, Clone, Deserialize)]
pub struct RegressionTable {
    pub intercept: f64,
    pub predictors: Vec<Predictor>,
}

/// The declarative model document.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDocument {
    pub name: String,
    pub inputs: Vec<InputField>,
    pub target: TargetField,
    pub regression: RegressionTable,
}

/// A verified, ready-to-run evaluator over a model document.
#[derive(Debug)]
pub struct Evaluator {
    document: ModelDocument,
}

impl Evaluator {
    /// Build an evaluator, verifying document consistency before first use.
    pub fn build(document: ModelDocument) -> Result<Self, PredictError> {
        let evaluator = Self { document };
        evaluator.verify()?;
        Ok(evaluator)
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn input_fields(&self) -> &[InputField] {
        &self.document.inputs
    }

    pub fn target(&self) -> &TargetField {
        &self.document.target
    }

    fn verify(&self) -> Result<(), PredictError> {
        let doc = &self.document;
        let fail = |reason: String| Err(PredictError::ModelVerification(reason));

        if doc.inputs.is_empty() {
            return fail("document declares no input fields".to_string());
        }
        for (i, field) in doc.inputs.iter().enumerate() {
            if doc.inputs[..i].iter().any(|f| f.name == field.name) {
                return fail(format!("duplicate input field '{}'", field.name));
            }
            match &field.kind {
                FieldKind::Categorical { categories } if categories.is_empty() => {
                    return fail(format!("field '{}' declares no categories", field.name));
                }
                FieldKind::Continuous { scale: Some(s) } if s.std == 0.0 || !s.std.is_finite() => {
                    return fail(format!("field '{}' has a degenerate scale spread", field.name));
                }
                _ => {}
            }
        }
        if doc.target.classes.len() != CLASS_COUNT {
            return fail(format!(
                "target '{}' declares {} classes, expected {}",
                doc.target.name,
                doc.target.classes.len(),
                CLASS_COUNT
            ));
        }
        for predictor in &doc.regression.predictors {
            let Some(field) = doc.inputs.iter().find(|f| f.name == predictor.field) else {
                return fail(format!(
                    "predictor references undeclared field '{}'",
                    predictor.field
                ));
            };
            match (&field.kind, &predictor.category) {
                (FieldKind::Continuous { .. }, Some(_)) => {
                    return fail(format!(
                        "continuous field '{}' cannot carry a category predictor",
                        field.name
                    ));
                }
                (FieldKind::Categorical { .. }, None) => {
                    return fail(format!(
                        "categorical field '{}' requires a category on its predictors",
                        field.name
                    ));
                }
                (FieldKind::Categorical { categories }, Some(category)) => {
                    if !categories.contains(category) {
                        return fail(format!(
                            "predictor references undeclared category '{}' of field '{}'",
                            category, field.name
                        ));
                    }
                }
                (FieldKind::Continuous { .. }, None) => {}
            }
        }
        Ok(())
    }

    /// Evaluate the regression over prepared arguments, in field declaration
    /// order (the order `encoder::prepare_arguments` produces).
    pub fn evaluate(&self, prepared: &[PreparedValue]) -> Distribution {
        let doc = &self.document;
        let mut z = doc.regression.intercept;
        for predictor in &doc.regression.predictors {
            // Field existence is guaranteed by verify().
            let Some(index) = doc.inputs.iter().position(|f| f.name == predictor.field) else {
                continue;
            };
            match (&prepared[index], &predictor.category) {
                (PreparedValue::Continuous(v), None) => z += predictor.coefficient * v,
                (PreparedValue::Category(Some(active)), Some(category)) => {
                    if let FieldKind::Categorical { categories } = &doc.inputs[index].kind {
                        if categories[*active] == *category {
                            z += predictor.coefficient;
                        }
                    }
                }
                _ => {}
            }
        }

        let p1 = 1.0 / (1.0 + (-z).exp());
        let mut map = ClassMap::new();
        map.insert(ClassKey::Int(0), 1.0 - p1);
        map.insert(ClassKey::Int(1), p1);

        let winner = if p1 >= 0.5 { 1 } else { 0 };
        let label = doc.target.classes[winner].clone();
        debug!(target = %doc.target.name, score = z, p1, "Regression evaluated");

        Distribution::new(label, RawValue::ClassMap(map))
    }
}

/// Backend over declarative model documents.
#[derive(Debug, Default)]
pub struct DistributionBackend;

impl DistributionBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for DistributionBackend {
    type Handle = Evaluator;
    type Input = Vec<PreparedValue>;

    fn load(&self, path: &Path) -> Result<Evaluator, PredictError> {
        info!(path = %path.display(), "Loading model document");
        let raw = fs::read_to_string(path)?;
        let document: ModelDocument = serde_json::from_str(&raw)?;
        let evaluator = Evaluator::build(document)?;
        info!(
            model = %evaluator.name(),
            inputs = evaluator.input_fields().len(),
            target = %evaluator.target().name,
            "Model document verified"
        );
        Ok(evaluator)
    }

    fn encode(&self, handle: &Evaluator, features: &FeatureSet) -> Result<Self::Input, PredictError> {
        encoder::prepare_arguments(handle.input_fields(), features)
    }

    fn run(&self, handle: &mut Evaluator, input: Self::Input) -> Result<RawOutput, PredictError> {
        let distribution = handle.evaluate(&input);
        let target = handle.target().name.clone();
        let mut raw = RawOutput::new(target.clone(), Some(target.clone()));
        raw.insert(target, RawValue::Distribution(distribution));
        Ok(raw)
    }
}
