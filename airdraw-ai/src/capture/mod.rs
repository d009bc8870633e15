//! Capture sources
//!
//! Two ways to obtain a [`airdraw_common::Capture`]: load a CSV export, or
//! record one live from the phone's sensor server.

pub mod coordinator;
pub mod csv_source;
pub mod phone;

pub use coordinator::{CaptureConfig, CaptureCoordinator, CaptureState};
pub use csv_source::{load_csv, read_csv};
pub use phone::{ControlCommand, PhoneClient, SensorLink};
