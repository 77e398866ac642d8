//! Error types for the prediction pipeline

use thiserror::Error;

/// Errors surfaced by model loading, feature encoding, and output
/// normalization.
///
/// Probability-shape mismatches are deliberately absent: an unrecognized
/// probability output degrades to an empty vector instead of failing the
/// prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The model declares an input that the feature set does not provide.
    #[error("model input '{name}' has no matching feature value")]
    UnknownFeature { name: String },

    /// A feature value cannot be coerced to the field's declared kind.
    #[error("feature '{name}' is not {expected}")]
    InvalidFeatureValue { name: String, expected: &'static str },

    /// The loaded model failed its consistency checks before first use.
    #[error("model verification failed: {0}")]
    ModelVerification(String),

    /// The inference result carries no label value at the resolved output
    /// name. A prediction without a label is not a prediction.
    #[error("inference result has no label value at output '{name}'")]
    MissingLabelOutput { name: String },

    /// ONNX Runtime failure: session construction, input binding, execution.
    #[error(transparent)]
    Runtime(#[from] ort::Error),

    /// The model artifact could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The model document is not valid JSON.
    #[error("model document parse error: {0}")]
    Document(#[from] serde_json::Error),
}
