//! Penguin Species Classifier Library
//!
//! Loads a pre-trained binary classifier (Adelie = 0, Gentoo = 1) in one of
//! two serialized formats, runs a single two-feature example through it, and
//! normalizes the backend-specific result into one canonical prediction
//! record.

pub mod config;
pub mod encoder;
pub mod error;
pub mod models;
pub mod reporter;
pub mod types;

pub use config::AppConfig;
pub use error::PredictError;
pub use models::backend::{predict, predict_with, Backend, BackendKind};
pub use models::normalizer::normalize;
pub use reporter::PredictionReporter;
pub use types::{feature::FeatureSet, prediction::Prediction};
