//! HTTP API handlers for airdraw-ai
//!
//! Thin host over the prediction pipeline: CSV upload, live capture, health,
//! and an SSE stream of capture/prediction events.

pub mod health;
pub mod predict;
pub mod sse;

pub use health::health_routes;
pub use predict::predict_routes;
pub use sse::event_stream;
