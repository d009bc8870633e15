//! Inference adapter
//!
//! Reshapes a normalized series into the (1, T, F) batch the classifier
//! expects, invokes it, and reduces the probability vector to a top class.
//! Only outputs of shape (1, 10) or (10,) are accepted.

use crate::error::{Error, Result};
use crate::pipeline::classifier::Classifier;
use crate::types::{FixedSeries, PredictionResult, CLASS_COUNT};
use ndarray::ArrayD;
use tracing::debug;

/// Classify one normalized series
///
/// # Errors
/// * `Inference` if the classifier fails or returns an unexpected shape
pub async fn predict(series: &FixedSeries, classifier: &dyn Classifier) -> Result<PredictionResult> {
    let batch = series.to_batch();

    let output = classifier
        .predict(&batch)
        .await
        .map_err(|e| Error::Inference(e.to_string()))?;

    let probabilities = probability_vector(output)?;
    let result = PredictionResult::from_probabilities(probabilities)?;

    debug!(
        digit = result.digit,
        confidence = result.confidence,
        "Classifier prediction"
    );
    Ok(result)
}

/// Accept (1, 10) or (10,) and flatten to a length-10 vector
fn probability_vector(output: ArrayD<f64>) -> Result<Vec<f64>> {
    let accepted = matches!(output.shape(), [CLASS_COUNT] | [1, CLASS_COUNT]);
    if !accepted {
        return Err(Error::Inference(format!(
            "classifier returned shape {:?}, expected (1, {}) or ({},)",
            output.shape(),
            CLASS_COUNT,
            CLASS_COUNT
        )));
    }
    Ok(output.iter().copied().collect())
}
