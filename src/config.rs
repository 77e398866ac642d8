//! Configuration management for the classifier

use crate::models::backend::BackendKind;
use crate::types::feature::{FeatureSet, FeatureValue};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub input: InputConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

/// Model artifact selection
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Backend used to load and run the artifact; explicit, never inferred
    /// from the file contents.
    #[serde(default)]
    pub backend: BackendKind,
    /// Path to the serialized model.
    pub path: String,
}

/// Raw feature values for the single example
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Feature name to literal value (number or category string).
    pub features: BTreeMap<String, FeatureValue>,
}

impl InputConfig {
    /// Build the feature set handed to the backend.
    pub fn to_feature_set(&self) -> FeatureSet {
        let mut features = FeatureSet::new();
        for (name, value) in &self.features {
            features.insert(name, value.clone());
        }
        features
    }
}

/// Report rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Human-readable class names ordered by class index.
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
}

fn default_classes() -> Vec<String> {
    vec!["Adelie".to_string(), "Gentoo".to_string()]
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut features = BTreeMap::new();
        features.insert("bill_length_mm".to_string(), FeatureValue::Number(40.3));
        features.insert(
            "island".to_string(),
            FeatureValue::Category("Torgersen".to_string()),
        );

        Self {
            model: ModelConfig {
                backend: BackendKind::Tensor,
                path: "model/penguin.onnx".to_string(),
            },
            input: InputConfig { features },
            report: ReportConfig {
                classes: default_classes(),
            },
            logging: LoggingConfig {
                level: default_level(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.model.backend, BackendKind::Tensor);
        assert_eq!(config.model.path, "model/penguin.onnx");
        assert_eq!(config.report.classes, vec!["Adelie", "Gentoo"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_input_covers_both_features() {
        let config = AppConfig::default();
        let features = config.input.to_feature_set();

        assert_eq!(features.len(), 2);
        assert_eq!(
            features.get("bill_length_mm"),
            Some(&FeatureValue::Number(40.3))
        );
        assert_eq!(
            features.get("island"),
            Some(&FeatureValue::Category("Torgersen".to_string()))
        );
    }
}
