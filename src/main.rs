//! Penguin Classifier - Main Entry Point
//!
//! Loads the configured model, runs one inference over the configured feature
//! values, and reports the normalized prediction.

use anyhow::{Context, Result};
use penguin_classifier::{
    config::AppConfig, models::backend::predict_with, reporter::PredictionReporter,
};
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("penguin_classifier={}", config.logging.level).parse()?),
        )
        .init();

    info!("Starting penguin classifier");

    let features = config.input.to_feature_set();
    info!(feature_count = features.len(), "Feature set assembled");

    let model_path = Path::new(&config.model.path);
    let prediction = predict_with(config.model.backend, model_path, &features)?;

    let reporter = PredictionReporter::new(config.report.classes.clone());
    reporter.report(model_path, &features, &prediction);

    Ok(())
}
