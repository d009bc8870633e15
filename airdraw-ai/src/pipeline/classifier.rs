//! Sequence classifier collaborator
//!
//! The trained model is opaque: anything that maps a (1, T, F) batch to class
//! probabilities implements [`Classifier`]. [`ServingClassifier`] talks to a
//! model server exposing the TensorFlow Serving REST predict contract:
//!
//! ```text
//! POST <url>   {"instances": [[[ax, ay, az, gx, gy, gz], ...T rows]]}
//! 200 OK       {"predictions": [[p0, p1, ..., p9]]}
//! ```

use async_trait::async_trait;
use ndarray::{Array3, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("airdraw-ai/", env!("CARGO_PKG_VERSION"));

/// Classifier invocation errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model server error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Opaque sequence classifier
///
/// Output is returned with whatever shape the model produced; the inference
/// adapter decides whether that shape is acceptable.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn predict(&self, batch: &Array3<f64>) -> Result<ArrayD<f64>, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: serde_json::Value,
}

/// HTTP client for a served model
pub struct ServingClassifier {
    http_client: reqwest::Client,
    url: String,
}

impl ServingClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for ServingClassifier {
    async fn predict(&self, batch: &Array3<f64>) -> Result<ArrayD<f64>, ClassifierError> {
        let request = PredictRequest {
            instances: batch
                .outer_iter()
                .map(|seq| seq.outer_iter().map(|row| row.to_vec()).collect())
                .collect(),
        };

        tracing::debug!(url = %self.url, shape = ?batch.dim(), "Querying model server");

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ApiError(status.as_u16(), error_text));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::ParseError(e.to_string()))?;

        json_to_array(&body.predictions)
    }
}

/// Convert a nested JSON number array into an n-dimensional array
///
/// Ragged nesting and non-numeric leaves are parse errors.
pub fn json_to_array(value: &serde_json::Value) -> Result<ArrayD<f64>, ClassifierError> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let serde_json::Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }

    let mut flat = Vec::with_capacity(shape.iter().product());
    flatten_into(value, &shape, &mut flat)?;

    ArrayD::from_shape_vec(IxDyn(&shape), flat)
        .map_err(|e| ClassifierError::ParseError(e.to_string()))
}

fn flatten_into(
    value: &serde_json::Value,
    shape: &[usize],
    out: &mut Vec<f64>,
) -> Result<(), ClassifierError> {
    match (value, shape.split_first()) {
        (serde_json::Value::Array(items), Some((&len, rest))) => {
            if items.len() != len {
                return Err(ClassifierError::ParseError(format!(
                    "ragged predictions: expected {} entries, found {}",
                    len,
                    items.len()
                )));
            }
            items.iter().try_for_each(|item| flatten_into(item, rest, out))
        }
        (serde_json::Value::Number(n), None) => {
            let v = n
                .as_f64()
                .ok_or_else(|| ClassifierError::ParseError(format!("unrepresentable number {}", n)))?;
            out.push(v);
            Ok(())
        }
        (other, _) => Err(ClassifierError::ParseError(format!(
            "unexpected value in predictions: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = ServingClassifier::new(
            "http://127.0.0.1:8501/v1/models/airdraw:predict",
            Duration::from_secs(5),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_json_to_array_batch_of_one() {
        let arr = json_to_array(&json!([[0.1, 0.2, 0.7]])).unwrap();
        assert_eq!(arr.shape(), &[1, 3]);
        assert_eq!(arr[[0, 2]], 0.7);
    }

    #[test]
    fn test_json_to_array_flat() {
        let arr = json_to_array(&json!([0.5, 0.5])).unwrap();
        assert_eq!(arr.shape(), &[2]);
    }

    #[test]
    fn test_json_to_array_ragged() {
        assert!(matches!(
            json_to_array(&json!([[0.1, 0.2], [0.3]])),
            Err(ClassifierError::ParseError(_))
        ));
    }

    #[test]
    fn test_json_to_array_non_numeric() {
        assert!(matches!(
            json_to_array(&json!([["a", "b"]])),
            Err(ClassifierError::ParseError(_))
        ));
    }
}
