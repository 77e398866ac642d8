//! Type definitions for the classifier

pub mod feature;
pub mod prediction;

pub use feature::{FeatureSet, FeatureValue};
pub use prediction::{Label, Prediction};
