//! Tensor-graph backend: serialized ONNX graphs executed through ONNX Runtime

use crate::encoder::{self, TensorFeature};
use crate::error::PredictError;
use crate::models::backend::Backend;
use crate::models::normalizer::{ClassKey, ClassMap, RawOutput, RawValue};
use crate::types::feature::FeatureSet;
use ort::memory::Allocator;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue, SessionInputs};
use ort::value::{
    DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, TensorValueType,
};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

/// Backend over serialized computation graphs.
pub struct TensorGraphBackend {
    /// Number of intra-op threads per session.
    intra_threads: usize,
}

/// A loaded graph session with its resolved input and output names.
pub struct TensorGraphModel {
    session: Session,
    input_names: Vec<String>,
    label_output: String,
    prob_output: Option<String>,
}

impl TensorGraphBackend {
    /// Create a backend with default settings (1 thread).
    pub fn new() -> Result<Self, PredictError> {
        Self::with_threads(1)
    }

    /// Create a backend with the given intra-op thread count.
    pub fn with_threads(intra_threads: usize) -> Result<Self, PredictError> {
        ort::init().commit()?;
        info!(intra_threads, "ONNX Runtime initialized");
        Ok(Self { intra_threads })
    }
}

/// Resolve which declared outputs carry the label and the probabilities.
///
/// The label output is the first name containing `"label"` (case-insensitive),
/// falling back to the first declared output. The probability output is the
/// first name containing `"prob"`; absence is a valid outcome, not an error.
/// Returns `None` when the graph declares no outputs at all.
fn resolve_output_names(declared: &[String]) -> Option<(String, Option<String>)> {
    let label = declared
        .iter()
        .find(|n| n.to_lowercase().contains("label"))
        .or_else(|| declared.first())?
        .clone();
    let prob = declared
        .iter()
        .find(|n| n.to_lowercase().contains("prob"))
        .cloned();
    Some((label, prob))
}

/// Split tensor data into rows when the shape is 2-D with a positive column
/// count; otherwise the data stays a flat row.
fn split_rows<T: Copy>(shape: &ort::tensor::Shape, data: &[T]) -> Option<Vec<Vec<T>>> {
    let dims: Vec<i64> = shape.iter().copied().collect();
    if dims.len() == 2 && dims[1] > 0 {
        let cols = dims[1] as usize;
        Some(data.chunks(cols).map(|chunk| chunk.to_vec()).collect())
    } else {
        None
    }
}

fn convert_map(output: &DynValue) -> Option<ClassMap> {
    let map = output.downcast_ref::<DynMapValueType>().ok()?;
    if let Ok(pairs) = map.try_extract_key_values::<i64, f32>() {
        let mut class_map = ClassMap::new();
        for (key, probability) in pairs {
            class_map.insert(ClassKey::Int(key), probability as f64);
        }
        return Some(class_map);
    }
    if let Ok(pairs) = map.try_extract_key_values::<String, f32>() {
        let mut class_map = ClassMap::new();
        for (key, probability) in pairs {
            class_map.insert(ClassKey::Text(key), probability as f64);
        }
        return Some(class_map);
    }
    None
}

fn convert_sequence(output: &DynValue) -> Option<RawValue> {
    let allocator = Allocator::default();
    let sequence = output.downcast_ref::<DynSequenceValueType>().ok()?;

    // seq(map(int64, float)) is what sklearn-style classifier exports emit.
    if let Ok(maps) = sequence.try_extract_sequence::<DynMapValueType>(&allocator) {
        let mut items = Vec::with_capacity(maps.len());
        for map in &maps {
            let pairs = map.try_extract_key_values::<i64, f32>().ok()?;
            let mut class_map = ClassMap::new();
            for (key, probability) in pairs {
                class_map.insert(ClassKey::Int(key), probability as f64);
            }
            items.push(RawValue::ClassMap(class_map));
        }
        return Some(RawValue::Sequence(items));
    }

    if let Ok(tensors) = sequence.try_extract_sequence::<TensorValueType<f32>>(&allocator) {
        let items = tensors
            .iter()
            .map(|tensor| {
                let (_, data) = tensor.extract_tensor();
                RawValue::FloatRow(data.to_vec())
            })
            .collect();
        return Some(RawValue::Sequence(items));
    }

    None
}

/// Convert one session output into the raw value set the normalizer
/// understands. `None` means the output's type is not interpretable here.
fn convert_output(output: &DynValue) -> Option<RawValue> {
    if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
        return Some(RawValue::Int64s(data.to_vec()));
    }
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        return Some(match split_rows(shape, data) {
            Some(rows) => RawValue::FloatMatrix(rows),
            None => RawValue::FloatRow(data.to_vec()),
        });
    }
    if let Ok((shape, data)) = output.try_extract_tensor::<f64>() {
        return Some(match split_rows(shape, data) {
            Some(rows) => RawValue::DoubleMatrix(rows),
            None => RawValue::DoubleRow(data.to_vec()),
        });
    }

    let dtype = output.dtype();
    if DynMapValueType::can_downcast(&dtype) {
        return convert_map(output).map(RawValue::ClassMap);
    }
    if DynSequenceValueType::can_downcast(&dtype) {
        return convert_sequence(output);
    }
    None
}

impl Backend for TensorGraphBackend {
    type Handle = TensorGraphModel;
    type Input = Vec<(String, TensorFeature)>;

    fn load(&self, path: &Path) -> Result<TensorGraphModel, PredictError> {
        info!(path = %path.display(), threads = self.intra_threads, "Loading tensor graph");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(path)?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let (label_output, prob_output) = resolve_output_names(&output_names).ok_or_else(|| {
            PredictError::ModelVerification("tensor graph declares no outputs".to_string())
        })?;

        info!(
            inputs = ?input_names,
            label_output = %label_output,
            prob_output = ?prob_output,
            "Tensor graph loaded"
        );

        Ok(TensorGraphModel {
            session,
            input_names,
            label_output,
            prob_output,
        })
    }

    fn encode(
        &self,
        handle: &TensorGraphModel,
        features: &FeatureSet,
    ) -> Result<Self::Input, PredictError> {
        encoder::bind_tensor_inputs(&handle.input_names, features)
    }

    fn run(
        &self,
        handle: &mut TensorGraphModel,
        input: Self::Input,
    ) -> Result<RawOutput, PredictError> {
        let mut bound: Vec<(Cow<'static, str>, SessionInputValue<'static>)> =
            Vec::with_capacity(input.len());
        for (name, feature) in input {
            let value = match feature {
                TensorFeature::Number(v) => {
                    SessionInputValue::Owned(Tensor::from_array((vec![1_i64, 1], vec![v]))?.into_dyn())
                }
                TensorFeature::Category(s) => {
                    let values = [s];
                    SessionInputValue::Owned(
                        Tensor::from_string_array((vec![1_i64, 1], values.as_slice()))?.into_dyn(),
                    )
                }
            };
            bound.push((Cow::Owned(name), value));
        }

        let outputs = handle.session.run(SessionInputs::<0>::ValueMap(bound))?;

        let mut raw = RawOutput::new(handle.label_output.clone(), handle.prob_output.clone());
        for (name, output) in outputs.iter() {
            match convert_output(&output) {
                Some(value) => raw.insert(name.to_string(), value),
                None => debug!(output = name, "Skipping output with uninterpretable type"),
            }
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_output_resolved_by_substring() {
        let declared = vec!["output_label".to_string(), "output_probability".to_string()];

        let (label, prob) = resolve_output_names(&declared).unwrap();

        assert_eq!(label, "output_label");
        assert_eq!(prob.as_deref(), Some("output_probability"));
    }

    #[test]
    fn test_resolution_is_case_insensitive() {
        let declared = vec!["Probabilities".to_string(), "Label_out".to_string()];

        let (label, prob) = resolve_output_names(&declared).unwrap();

        assert_eq!(label, "Label_out");
        assert_eq!(prob.as_deref(), Some("Probabilities"));
    }

    #[test]
    fn test_label_falls_back_to_first_declared_output() {
        let declared = vec!["scores".to_string(), "variances".to_string()];

        let (label, prob) = resolve_output_names(&declared).unwrap();

        assert_eq!(label, "scores");
        assert!(prob.is_none());
    }

    #[test]
    fn test_no_outputs_is_unresolvable() {
        assert!(resolve_output_names(&[]).is_none());
    }
}
