//! # Airdraw Common Library
//!
//! Shared code for the air-draw digit recognizer including:
//! - Sensor data model (channel order, raw samples, captures)
//! - Event types (AirdrawEvent enum) and the broadcast event bus
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod sensor;

pub use error::{Error, Result};
pub use sensor::{Capture, Channel, ChannelBuffers, RawSample, CHANNEL_COUNT};
