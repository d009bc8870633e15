//! Signal-preparation and inference pipeline
//!
//! ```text
//! Capture ──► Resampler ──► Normalizer ──► Inference adapter ──► PredictionResult
//!  (L, 6)       (T, 6)        (T, 6)          (1, T, 6)
//! ```
//!
//! CSV files and live captures both enter here as a [`Capture`], so both
//! paths share one pipeline. [`InferenceContext`] holds the state loaded at
//! startup (normalization model, classifier, T) and is read-only afterwards;
//! it can be shared across concurrent requests behind an `Arc`.

pub mod classifier;
pub mod inference;
pub mod normalizer;
pub mod resampler;

pub use classifier::{Classifier, ClassifierError, ServingClassifier};
pub use normalizer::{AffineStats, FeatureTransform, FittedScaler, NormalizationModel, ScalerKind};
pub use resampler::Resampler;

use crate::error::{Error, Result};
use crate::types::{FixedSeries, PredictionResult};
use airdraw_common::config::ModelConfig;
use airdraw_common::{Capture, CHANNEL_COUNT};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Immutable state every prediction needs
pub struct InferenceContext {
    normalization: NormalizationModel,
    classifier: Arc<dyn Classifier>,
    sequence_length: usize,
}

impl InferenceContext {
    /// # Errors
    /// * `ShapeMismatch` if the normalization was fitted on other than 6 channels
    /// * `Config` if `sequence_length` is 0
    pub fn new(
        normalization: NormalizationModel,
        classifier: Arc<dyn Classifier>,
        sequence_length: usize,
    ) -> Result<Self> {
        if normalization.feature_count() != CHANNEL_COUNT {
            return Err(Error::ShapeMismatch(format!(
                "normalization fitted on {} features, pipeline uses {}",
                normalization.feature_count(),
                CHANNEL_COUNT
            )));
        }
        if sequence_length == 0 {
            return Err(Error::Config("sequence length must be at least 1".to_string()));
        }

        Ok(Self {
            normalization,
            classifier,
            sequence_length,
        })
    }

    /// Load the normalization artifact and connect the served classifier
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let normalization = NormalizationModel::load(&config.normalization_path)?;
        let classifier = ServingClassifier::new(
            config.classifier_url.clone(),
            Duration::from_millis(config.classifier_timeout_ms),
        )
        .map_err(|e| Error::Config(format!("Failed to create classifier client: {}", e)))?;

        info!(
            classifier_url = %config.classifier_url,
            sequence_length = config.sequence_length,
            "Inference context ready"
        );

        Self::new(normalization, Arc::new(classifier), config.sequence_length)
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn normalization(&self) -> &NormalizationModel {
        &self.normalization
    }

    /// Resample and normalize, producing the classifier input
    pub fn prepare(&self, capture: &Capture) -> Result<FixedSeries> {
        let series = Resampler::resample(capture, self.sequence_length)?;
        self.normalization.normalize(&series)
    }

    /// Full pipeline for one capture
    pub async fn predict_capture(&self, capture: &Capture) -> Result<PredictionResult> {
        let series = self.prepare(capture)?;
        inference::predict(&series, self.classifier.as_ref()).await
    }
}
