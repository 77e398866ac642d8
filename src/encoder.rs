//! Feature encoding for model inference.
//!
//! This module turns raw feature values into the input representation each
//! backend natively binds: single-row tensors for the tensor-graph backend,
//! prepared argument lists for the distribution evaluator. Encoding happens
//! before the backend runs; a feature set that does not cover the model's
//! declared inputs never reaches inference.

use crate::error::PredictError;
use crate::models::evaluator::{InputField, PreparedValue};
use crate::types::feature::{FeatureSet, FeatureValue};

/// A feature encoded for tensor binding: one single-row, single-column value
/// per declared input name, batch size fixed at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorFeature {
    Number(f32),
    Category(String),
}

/// Encode the feature set against the input names a tensor graph declares.
///
/// Bindings come back in declaration order. Fails with
/// [`PredictError::UnknownFeature`] if any declared input has no matching
/// feature value.
pub fn bind_tensor_inputs(
    declared: &[String],
    features: &FeatureSet,
) -> Result<Vec<(String, TensorFeature)>, PredictError> {
    let mut bindings = Vec::with_capacity(declared.len());
    for name in declared {
        let value = features
            .get(name)
            .ok_or_else(|| PredictError::UnknownFeature { name: name.clone() })?;
        let encoded = match value {
            FeatureValue::Number(v) => TensorFeature::Number(*v as f32),
            FeatureValue::Category(s) => TensorFeature::Category(s.clone()),
        };
        bindings.push((name.clone(), encoded));
    }
    reject_undeclared(features, |name| declared.iter().any(|d| d == name))?;
    Ok(bindings)
}

/// The feature set must carry exactly the declared input names; a name the
/// model never declared is as much an error as a missing one.
fn reject_undeclared(
    features: &FeatureSet,
    is_declared: impl Fn(&str) -> bool,
) -> Result<(), PredictError> {
    for (name, _) in features.iter() {
        if !is_declared(name) {
            return Err(PredictError::UnknownFeature {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Prepare the feature set against the input fields a model document declares.
///
/// Every field applies its own declared preparation function; the prepared
/// values come back in field declaration order. Fields absent from the
/// feature set fail rather than silently defaulting.
pub fn prepare_arguments(
    fields: &[InputField],
    features: &FeatureSet,
) -> Result<Vec<PreparedValue>, PredictError> {
    let mut prepared = Vec::with_capacity(fields.len());
    for field in fields {
        let value = features
            .get(field.name())
            .ok_or_else(|| PredictError::UnknownFeature {
                name: field.name().to_string(),
            })?;
        prepared.push(field.prepare(value)?);
    }
    reject_undeclared(features, |name| fields.iter().any(|f| f.name() == name))?;
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binds_declared_inputs_in_order() {
        let declared = vec!["bill_length_mm".to_string(), "island".to_string()];
        let features = FeatureSet::new()
            .with_category("island", "Torgersen")
            .with_number("bill_length_mm", 40.3);

        let bindings = bind_tensor_inputs(&declared, &features).unwrap();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].0, "bill_length_mm");
        assert_eq!(bindings[0].1, TensorFeature::Number(40.3));
        assert_eq!(bindings[1].0, "island");
        assert_eq!(
            bindings[1].1,
            TensorFeature::Category("Torgersen".to_string())
        );
    }

    #[test]
    fn test_missing_feature_is_rejected() {
        let declared = vec!["bill_length_mm".to_string(), "island".to_string()];
        let features = FeatureSet::new().with_number("bill_length_mm", 40.3);

        let err = bind_tensor_inputs(&declared, &features).unwrap_err();

        assert!(matches!(
            err,
            PredictError::UnknownFeature { ref name } if name == "island"
        ));
    }

    #[test]
    fn test_undeclared_feature_is_rejected() {
        let declared = vec!["bill_length_mm".to_string()];
        let features = FeatureSet::new()
            .with_number("bill_length_mm", 40.3)
            .with_number("flipper_length_mm", 195.0);

        let err = bind_tensor_inputs(&declared, &features).unwrap_err();

        assert!(matches!(
            err,
            PredictError::UnknownFeature { ref name } if name == "flipper_length_mm"
        ));
    }
}
