//! Event types for the airdraw event system
//!
//! Capture progress and prediction outcomes are published on a broadcast
//! [`EventBus`] so that any number of observers (SSE clients, the CLI) can
//! follow a live capture without the coordinator knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Where a prediction's input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Csv,
    Live,
}

/// Airdraw event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AirdrawEvent {
    /// Phone started buffering samples
    CaptureStarted {
        capture_id: Uuid,
        window_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Phone stopped buffering samples
    CaptureStopped {
        capture_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Buffers fetched and aligned
    CaptureFetched {
        capture_id: Uuid,
        /// Samples per channel after truncation to the shortest buffer
        samples: usize,
        timestamp: DateTime<Utc>,
    },

    /// Capture attempt abandoned
    CaptureFailed {
        capture_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A digit was classified
    PredictionCompleted {
        digit: usize,
        confidence: f64,
        source: InputSource,
        timestamp: DateTime<Utc>,
    },
}

impl AirdrawEvent {
    /// Event name used for SSE `event:` lines
    pub fn event_type(&self) -> &str {
        match self {
            AirdrawEvent::CaptureStarted { .. } => "CaptureStarted",
            AirdrawEvent::CaptureStopped { .. } => "CaptureStopped",
            AirdrawEvent::CaptureFetched { .. } => "CaptureFetched",
            AirdrawEvent::CaptureFailed { .. } => "CaptureFailed",
            AirdrawEvent::PredictionCompleted { .. } => "PredictionCompleted",
        }
    }
}

/// Broadcast bus for [`AirdrawEvent`]s
///
/// Cloning yields another handle onto the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AirdrawEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering at most `capacity` undelivered events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AirdrawEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AirdrawEvent,
    ) -> Result<usize, broadcast::error::SendError<AirdrawEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AirdrawEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
