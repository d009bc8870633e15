//! airdraw-ai library interface
//!
//! Classifies a digit drawn in the air from six channels of phone
//! accelerometer/gyroscope samples. Exposes the pipeline, capture sources and
//! HTTP API for the binary and for integration testing.

pub mod api;
pub mod capture;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod types;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use airdraw_common::events::EventBus;
use axum::Router;
use capture::{CaptureCoordinator, SensorLink};
use chrono::{DateTime, Utc};
use pipeline::InferenceContext;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Coordinator over a type-erased phone link, as held by the API host
pub type SharedCoordinator = Arc<Mutex<CaptureCoordinator<Arc<dyn SensorLink>>>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Normalization model and classifier, read-only after startup
    pub context: Arc<InferenceContext>,
    /// Single-acquisition lock around the phone
    pub capture: SharedCoordinator,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last prediction error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// The coordinator is wired to publish on `event_bus`
    pub fn new(
        context: Arc<InferenceContext>,
        coordinator: CaptureCoordinator<Arc<dyn SensorLink>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            context,
            capture: Arc::new(Mutex::new(coordinator.with_events(event_bus.clone()))),
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::predict_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
