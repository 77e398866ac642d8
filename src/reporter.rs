//! Console rendering for canonical predictions

use crate::types::feature::FeatureSet;
use crate::types::prediction::Prediction;
use std::path::Path;
use tracing::info;

/// Renders a canonical prediction together with the inputs that produced it.
///
/// Relies on the normalizer's contract: the label is always printable, and a
/// present probability vector is ordered by class index ascending.
pub struct PredictionReporter {
    /// Class names ordered by class index.
    class_names: Vec<String>,
}

impl PredictionReporter {
    pub fn new(class_names: Vec<String>) -> Self {
        Self { class_names }
    }

    /// Print the prediction to stdout.
    pub fn report(&self, model_path: &Path, features: &FeatureSet, prediction: &Prediction) {
        println!("Model: {}", model_path.display());
        for (name, value) in features.iter() {
            println!("  Input {}: {}", name, value);
        }
        println!("  Predicted label: {}", prediction.label);
        if prediction.has_probabilities {
            let rendered: Vec<String> = prediction
                .probabilities
                .iter()
                .map(|p| format!("{:.4}", p))
                .collect();
            println!(
                "  Probabilities [{}]: [{}]",
                self.class_names.join(", "),
                rendered.join(", ")
            );
        }

        info!(
            label = %prediction.label,
            has_probabilities = prediction.has_probabilities,
            "Prediction reported"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::Label;

    #[test]
    fn test_report_handles_degenerate_vector() {
        let reporter = PredictionReporter::new(vec!["Adelie".to_string(), "Gentoo".to_string()]);
        let features = FeatureSet::new().with_number("bill_length_mm", 40.3);
        let prediction = Prediction::with_probabilities(Label::Int(0), Vec::new());

        // Rendering must not assume the vector has the full class count.
        reporter.report(Path::new("model/penguin.onnx"), &features, &prediction);
    }
}
