//! Prediction endpoints
//!
//! - `POST /predict/csv`: request body is CSV text
//! - `POST /predict/live`: record one capture from the phone, then predict
//!
//! CSV predictions run concurrently. Live captures are serialized: the phone
//! has one buffer, so a second live request while one is recording gets 409.
//!
//! `last_error` on the shared state reflects the most recent request only.

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::capture::csv_source::read_csv;
use crate::error::{ApiError, ApiResult, Error, Result};
use crate::types::PredictionResult;
use crate::AppState;
use airdraw_common::events::{AirdrawEvent, InputSource};
use airdraw_common::Capture;

/// Prediction response body
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub digit: usize,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
    pub source: InputSource,
    /// Samples in the capture before resampling
    pub samples: usize,
}

impl PredictionResponse {
    fn new(result: PredictionResult, source: InputSource, samples: usize) -> Self {
        Self {
            digit: result.digit,
            confidence: result.confidence,
            probabilities: result.probabilities,
            source,
            samples,
        }
    }
}

/// POST /predict/csv
pub async fn predict_csv(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<PredictionResponse>> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("request body is empty".to_string()));
    }

    let outcome = match read_csv(body.as_bytes()) {
        Ok(capture) => run_pipeline(&state, &capture, InputSource::Csv).await,
        Err(e) => Err(e),
    };
    finish(&state, outcome).await
}

/// POST /predict/live
pub async fn predict_live(State(state): State<AppState>) -> ApiResult<Json<PredictionResponse>> {
    let mut coordinator = state.capture.clone().try_lock_owned().map_err(|_| {
        warn!("Live capture requested while another is recording");
        ApiError::Conflict("a live capture is already in progress".to_string())
    })?;

    info!("Live capture requested");
    // The cycle runs on its own task so a client disconnect cannot abandon
    // the phone mid-recording; the lock is released when the task finishes.
    let recording = tokio::spawn(async move { coordinator.record().await });
    let recorded = recording
        .await
        .map_err(|e| Error::Internal(format!("capture task failed: {}", e)))
        .and_then(|recorded| recorded);

    let outcome = match recorded {
        Ok(capture) => run_pipeline(&state, &capture, InputSource::Live).await,
        Err(e) => Err(e),
    };
    finish(&state, outcome).await
}

async fn run_pipeline(
    state: &AppState,
    capture: &Capture,
    source: InputSource,
) -> Result<PredictionResponse> {
    let result = state.context.predict_capture(capture).await?;

    info!(
        digit = result.digit,
        confidence = result.confidence,
        source = ?source,
        samples = capture.len(),
        "Prediction completed"
    );
    state.event_bus.emit_lossy(AirdrawEvent::PredictionCompleted {
        digit: result.digit,
        confidence: result.confidence,
        source,
        timestamp: Utc::now(),
    });

    Ok(PredictionResponse::new(result, source, capture.len()))
}

/// Record the outcome for `/health` and convert to a response
async fn finish(
    state: &AppState,
    outcome: Result<PredictionResponse>,
) -> ApiResult<Json<PredictionResponse>> {
    match outcome {
        Ok(response) => {
            *state.last_error.write().await = None;
            Ok(Json(response))
        }
        Err(e) => {
            warn!(error = %e, "Prediction failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/predict/csv", post(predict_csv))
        .route("/predict/live", post(predict_live))
}
