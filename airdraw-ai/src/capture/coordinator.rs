//! Live capture coordinator
//!
//! Drives one timed acquisition against the phone:
//!
//! ```text
//! Idle ──begin()──► Recording ──(window)──► end() ──► Stopped ──fetch()──► reset() ──► Idle
//! ```
//!
//! The acquisition window is a real-time wait: the phone records for a fixed
//! physical duration and no samples are read meanwhile. The phone has one
//! buffer, so a coordinator must never run two overlapping captures; hosts
//! serving concurrent requests hold it behind a single-acquisition lock.
//!
//! Failure policy:
//! - `begin()` fails: nothing else is attempted, the error goes to the caller
//! - any later step fails: `reset()` is still attempted, the original error
//!   goes to the caller
//! - `reset()` fails after a good fetch: the reset error goes to the caller,
//!   since the phone may still hold stale samples
//!
//! No step is retried. A cycle abandoned mid-flight (its future dropped) is
//! cleaned up by the next `record()`; hosts that must not abandon a cycle run
//! it on its own task.

use crate::capture::phone::{ControlCommand, SensorLink};
use crate::error::{Error, Result};
use airdraw_common::config::SensorConfig;
use airdraw_common::events::{AirdrawEvent, EventBus};
use airdraw_common::Capture;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Timing of one acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// How long the phone records
    pub window: Duration,
    /// Pause before recording starts so the user can get ready
    pub lead_in: Duration,
    /// Nominal rate used to synthesize timestamps
    pub sampling_rate_hz: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(2),
            lead_in: Duration::from_secs(1),
            sampling_rate_hz: 100.0,
        }
    }
}

impl From<&SensorConfig> for CaptureConfig {
    fn from(config: &SensorConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            lead_in: Duration::from_millis(config.lead_in_ms),
            sampling_rate_hz: config.sampling_rate_hz,
        }
    }
}

/// Coordinator's view of the phone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopped,
    /// A command failed; the phone's real state is not known
    Unknown,
}

/// Runs start / wait / stop / fetch / clear against a [`SensorLink`]
pub struct CaptureCoordinator<L: SensorLink> {
    link: L,
    config: CaptureConfig,
    state: CaptureState,
    capture_id: Option<Uuid>,
    events: Option<EventBus>,
}

impl<L: SensorLink> CaptureCoordinator<L> {
    pub fn new(link: L, config: CaptureConfig) -> Self {
        Self {
            link,
            config,
            state: CaptureState::Idle,
            capture_id: None,
            events: None,
        }
    }

    /// Publish progress on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Id of the capture in progress (or the last one attempted)
    pub fn capture_id(&self) -> Option<Uuid> {
        self.capture_id
    }

    /// Tell the phone to start buffering. Allowed from `Idle` or `Unknown`.
    pub async fn begin(&mut self) -> Result<()> {
        if !matches!(self.state, CaptureState::Idle | CaptureState::Unknown) {
            return Err(self.invalid_transition("begin"));
        }
        let capture_id = Uuid::new_v4();
        self.capture_id = Some(capture_id);

        if let Err(e) = self.link.send_command(ControlCommand::Start).await {
            self.state = CaptureState::Unknown;
            return Err(e.into());
        }

        self.state = CaptureState::Recording;
        info!(capture_id = %capture_id, "Recording started");
        self.emit(AirdrawEvent::CaptureStarted {
            capture_id,
            window_ms: self.config.window.as_millis() as u64,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Tell the phone to stop buffering. Requires `Recording`.
    pub async fn end(&mut self) -> Result<()> {
        if self.state != CaptureState::Recording {
            return Err(self.invalid_transition("end"));
        }

        if let Err(e) = self.link.send_command(ControlCommand::Stop).await {
            self.state = CaptureState::Unknown;
            return Err(e.into());
        }

        self.state = CaptureState::Stopped;
        info!(capture_id = ?self.capture_id, "Recording stopped");
        if let Some(capture_id) = self.capture_id {
            self.emit(AirdrawEvent::CaptureStopped {
                capture_id,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Fetch the six buffers and align them into a capture. Requires `Stopped`.
    pub async fn fetch(&mut self) -> Result<Capture> {
        if self.state != CaptureState::Stopped {
            return Err(self.invalid_transition("fetch"));
        }

        let buffers = self.link.fetch_buffers().await?;
        let lengths = buffers.lengths();
        let capture = Capture::from_buffers(buffers, self.config.sampling_rate_hz);

        if lengths.iter().any(|&len| len != capture.len()) {
            debug!(
                lengths = ?lengths,
                kept = capture.len(),
                "Channel buffers truncated to shortest"
            );
        }
        info!(
            capture_id = ?self.capture_id,
            samples = capture.len(),
            "Capture fetched"
        );
        if let Some(capture_id) = self.capture_id {
            self.emit(AirdrawEvent::CaptureFetched {
                capture_id,
                samples: capture.len(),
                timestamp: Utc::now(),
            });
        }
        Ok(capture)
    }

    /// Tell the phone to discard its buffers. Allowed from any state.
    pub async fn reset(&mut self) -> Result<()> {
        if let Err(e) = self.link.send_command(ControlCommand::Clear).await {
            self.state = CaptureState::Unknown;
            return Err(e.into());
        }
        self.state = CaptureState::Idle;
        debug!(capture_id = ?self.capture_id, "Phone buffers cleared");
        Ok(())
    }

    /// Run one complete acquisition cycle
    ///
    /// A previous cycle that was dropped mid-flight leaves the coordinator in
    /// `Recording` or `Stopped`; the phone is cleared before starting again.
    pub async fn record(&mut self) -> Result<Capture> {
        if matches!(self.state, CaptureState::Recording | CaptureState::Stopped) {
            warn!(
                capture_id = ?self.capture_id,
                state = ?self.state,
                "Previous capture was interrupted, clearing phone"
            );
            if let Err(e) = self.reset().await {
                self.emit_failure(&e);
                return Err(e);
            }
        }

        if !self.config.lead_in.is_zero() {
            debug!(lead_in = ?self.config.lead_in, "Waiting before recording");
            tokio::time::sleep(self.config.lead_in).await;
        }

        if let Err(e) = self.begin().await {
            warn!(error = %e, "Could not start recording");
            self.emit_failure(&e);
            return Err(e);
        }

        tokio::time::sleep(self.config.window).await;

        let outcome = match self.end().await {
            Ok(()) => self.fetch().await,
            Err(e) => Err(e),
        };
        let cleared = self.reset().await;

        let result = match (outcome, cleared) {
            (Ok(capture), Ok(())) => Ok(capture),
            (Ok(_), Err(reset_err)) => Err(reset_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(reset_err)) => {
                warn!(error = %reset_err, "Clearing phone buffers also failed");
                Err(e)
            }
        };

        if let Err(e) = &result {
            warn!(capture_id = ?self.capture_id, error = %e, "Capture abandoned");
            self.emit_failure(e);
        }
        result
    }

    fn invalid_transition(&self, operation: &str) -> Error {
        Error::InvalidState(format!(
            "cannot {} while coordinator is {:?}",
            operation, self.state
        ))
    }

    fn emit(&self, event: AirdrawEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }

    fn emit_failure(&self, error: &Error) {
        if let Some(capture_id) = self.capture_id {
            self.emit(AirdrawEvent::CaptureFailed {
                capture_id,
                error: error.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use airdraw_common::{ChannelBuffers, CHANNEL_COUNT};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call; fails the configured step
    #[derive(Default)]
    struct ScriptedLink {
        calls: Mutex<Vec<&'static str>>,
        fail_on: Option<&'static str>,
        lengths: [usize; CHANNEL_COUNT],
    }

    impl ScriptedLink {
        fn failing(step: &'static str) -> Self {
            Self {
                fail_on: Some(step),
                lengths: [10; CHANNEL_COUNT],
                ..Default::default()
            }
        }

        fn with_lengths(lengths: [usize; CHANNEL_COUNT]) -> Self {
            Self {
                lengths,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn step(&self, name: &'static str) -> std::result::Result<(), CollaboratorError> {
            self.calls.lock().unwrap().push(name);
            if self.fail_on == Some(name) {
                return Err(CollaboratorError::Connect {
                    url: "http://phone".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SensorLink for ScriptedLink {
        async fn send_command(
            &self,
            command: ControlCommand,
        ) -> std::result::Result<(), CollaboratorError> {
            self.step(command.as_str())
        }

        async fn fetch_buffers(&self) -> std::result::Result<ChannelBuffers, CollaboratorError> {
            self.step("get")?;
            Ok(ChannelBuffers::new(std::array::from_fn(|i| {
                vec![i as f64; self.lengths[i]]
            })))
        }
    }

    fn quick() -> CaptureConfig {
        CaptureConfig {
            window: Duration::from_millis(5),
            lead_in: Duration::ZERO,
            sampling_rate_hz: 100.0,
        }
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let link = ScriptedLink::with_lengths([120, 110, 115, 101, 130, 100]);
        let mut coordinator = CaptureCoordinator::new(link, quick());

        let capture = coordinator.record().await.unwrap();
        assert_eq!(capture.len(), 100);
        assert_eq!(coordinator.state(), CaptureState::Idle);
        assert_eq!(
            coordinator.link().calls(),
            vec!["start", "stop", "get", "clear"]
        );
    }

    #[tokio::test]
    async fn test_begin_failure_short_circuits() {
        let mut coordinator = CaptureCoordinator::new(ScriptedLink::failing("start"), quick());

        let err = coordinator.record().await.unwrap_err();
        assert!(matches!(err, Error::CollaboratorUnreachable(_)));
        assert_eq!(coordinator.link().calls(), vec!["start"]);
        assert_eq!(coordinator.state(), CaptureState::Unknown);
    }

    #[tokio::test]
    async fn test_fetch_failure_still_clears() {
        let mut coordinator = CaptureCoordinator::new(ScriptedLink::failing("get"), quick());

        let err = coordinator.record().await.unwrap_err();
        assert!(matches!(err, Error::CollaboratorUnreachable(_)));
        assert_eq!(
            coordinator.link().calls(),
            vec!["start", "stop", "get", "clear"]
        );
        assert_eq!(coordinator.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_stop_failure_skips_fetch_but_clears() {
        let mut coordinator = CaptureCoordinator::new(ScriptedLink::failing("stop"), quick());

        assert!(coordinator.record().await.is_err());
        assert_eq!(coordinator.link().calls(), vec!["start", "stop", "clear"]);
    }

    #[tokio::test]
    async fn test_clear_failure_after_fetch_is_reported() {
        let mut coordinator = CaptureCoordinator::new(ScriptedLink::failing("clear"), quick());

        assert!(coordinator.record().await.is_err());
        assert_eq!(coordinator.state(), CaptureState::Unknown);
    }

    #[tokio::test]
    async fn test_out_of_order_operations_rejected() {
        let mut coordinator = CaptureCoordinator::new(ScriptedLink::default(), quick());

        assert!(matches!(coordinator.end().await, Err(Error::InvalidState(_))));
        assert!(matches!(coordinator.fetch().await, Err(Error::InvalidState(_))));

        coordinator.begin().await.unwrap();
        assert!(matches!(coordinator.begin().await, Err(Error::InvalidState(_))));
        assert_eq!(coordinator.link().calls(), vec!["start"]);
    }

    #[tokio::test]
    async fn test_interrupted_cycle_recovers() {
        let link = ScriptedLink::with_lengths([40; CHANNEL_COUNT]);
        let mut coordinator = CaptureCoordinator::new(
            link,
            CaptureConfig {
                window: Duration::from_millis(500),
                ..quick()
            },
        );

        let interrupted =
            tokio::time::timeout(Duration::from_millis(50), coordinator.record()).await;
        assert!(interrupted.is_err());
        assert_eq!(coordinator.state(), CaptureState::Recording);

        coordinator.config.window = Duration::from_millis(5);
        let capture = coordinator.record().await.unwrap();
        assert_eq!(capture.len(), 40);
        assert_eq!(coordinator.state(), CaptureState::Idle);
        assert_eq!(
            coordinator.link().calls(),
            vec!["start", "clear", "start", "stop", "get", "clear"]
        );
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut coordinator =
            CaptureCoordinator::new(ScriptedLink::with_lengths([50; CHANNEL_COUNT]), quick())
                .with_events(bus);

        coordinator.record().await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type().to_string());
        }
        assert_eq!(kinds, vec!["CaptureStarted", "CaptureStopped", "CaptureFetched"]);
    }
}
