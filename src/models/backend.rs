//! Backend polymorphism and the single-call prediction flow

use crate::error::PredictError;
use crate::models::normalizer::{normalize, RawOutput};
use crate::types::feature::FeatureSet;
use crate::types::prediction::Prediction;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Capability set every inference backend provides.
///
/// A handle is loaded per call and never pooled; its `Drop` releases the
/// underlying session or evaluator, so the model is unloaded deterministically
/// whether encoding, execution, or nothing at all fails.
pub trait Backend {
    /// Loaded-model object, exclusively owned by one inference call.
    type Handle;
    /// Backend-native encoded input binding.
    type Input;

    /// Load a model artifact from a file path.
    fn load(&self, path: &Path) -> Result<Self::Handle, PredictError>;

    /// Encode raw features against the schema the loaded model declares.
    fn encode(&self, handle: &Self::Handle, features: &FeatureSet)
        -> Result<Self::Input, PredictError>;

    /// Execute one inference over the encoded inputs.
    fn run(&self, handle: &mut Self::Handle, input: Self::Input)
        -> Result<RawOutput, PredictError>;
}

/// Backend selection. Always explicit configuration, never inferred from the
/// model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Serialized computation graph executed through ONNX Runtime.
    #[default]
    Tensor,
    /// Declarative model document evaluated natively.
    Distribution,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Tensor => write!(f, "tensor"),
            BackendKind::Distribution => write!(f, "distribution"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tensor" => Ok(BackendKind::Tensor),
            "distribution" => Ok(BackendKind::Distribution),
            other => Err(format!(
                "unknown backend '{}' (expected 'tensor' or 'distribution')",
                other
            )),
        }
    }
}

/// Run one prediction: load, encode, execute, normalize.
///
/// The handle lives exactly as long as this call; it is dropped before the
/// normalized prediction is returned.
pub fn predict<B: Backend>(
    backend: &B,
    path: &Path,
    features: &FeatureSet,
) -> Result<Prediction, PredictError> {
    let mut handle = backend.load(path)?;
    let input = backend.encode(&handle, features)?;
    let raw = backend.run(&mut handle, input)?;
    drop(handle);
    normalize(&raw)
}

/// Dispatch a prediction to the configured backend variant.
pub fn predict_with(
    kind: BackendKind,
    path: &Path,
    features: &FeatureSet,
) -> Result<Prediction, PredictError> {
    use crate::models::evaluator::DistributionBackend;
    use crate::models::tensor::TensorGraphBackend;

    info!(backend = %kind, path = %path.display(), "Running prediction");
    match kind {
        BackendKind::Tensor => predict(&TensorGraphBackend::new()?, path, features),
        BackendKind::Distribution => predict(&DistributionBackend::new(), path, features),
    }
}
