//! Core pipeline types
//!
//! - [`FixedSeries`]: resampled (T, F) tensor in canonical channel order
//! - [`PredictionResult`]: top class, confidence, full probability vector

use crate::error::{Error, Result};
use airdraw_common::{Channel, CHANNEL_COUNT};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

/// Number of digit classes (0-9)
pub const CLASS_COUNT: usize = 10;

/// Fixed-length multichannel series, shape (T, F)
///
/// Column `j` holds `Channel::ALL[j]`. Constructed by the resampler and
/// rewritten in place by the normalizer; the shape never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSeries {
    data: Array2<f64>,
}

impl FixedSeries {
    /// Wrap a (T, F) array, rejecting anything that is not F = 6 columns
    pub fn from_array(data: Array2<f64>) -> Result<Self> {
        if data.ncols() != CHANNEL_COUNT {
            return Err(Error::ShapeMismatch(format!(
                "series has {} channels, expected {}",
                data.ncols(),
                CHANNEL_COUNT
            )));
        }
        Ok(Self { data })
    }

    /// Number of time steps T
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Number of channels F
    pub fn channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn column(&self, channel: Channel) -> ArrayView1<'_, f64> {
        self.data.column(channel.index())
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }

    /// Batch of one, shape (1, T, F)
    pub fn to_batch(&self) -> Array3<f64> {
        self.data.clone().insert_axis(Axis(0))
    }
}

/// Outcome of classifying one capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Predicted digit, index of the maximum probability
    pub digit: usize,
    /// Probability at `digit`
    pub confidence: f64,
    /// Full class probability vector, length 10
    pub probabilities: Vec<f64>,
}

/// Rounding slack above 1.0 for single-precision softmax outputs
const PROBABILITY_TOLERANCE: f64 = 1e-6;

impl PredictionResult {
    /// Reduce a probability vector to its top class
    ///
    /// Ties resolve to the lowest index. Entries outside [0, 1] (logits, a
    /// broken softmax) are rejected rather than reported as a prediction.
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.len() != CLASS_COUNT {
            return Err(Error::Inference(format!(
                "expected {} class probabilities, got {}",
                CLASS_COUNT,
                probabilities.len()
            )));
        }
        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(Error::Inference(format!(
                "classifier produced non-finite probability {}",
                bad
            )));
        }
        if let Some((class, p)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0 + PROBABILITY_TOLERANCE).contains(*p))
        {
            return Err(Error::Inference(format!(
                "classifier output for class {} is {}, not a probability in [0, 1]",
                class, p
            )));
        }

        let mut digit = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[digit] {
                digit = i;
            }
        }

        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            tracing::warn!(sum = sum, "Classifier probabilities do not sum to 1");
        }

        Ok(Self {
            digit,
            confidence: probabilities[digit],
            probabilities,
        })
    }
}
