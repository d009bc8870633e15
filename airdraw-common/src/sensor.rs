//! Sensor data model
//!
//! A capture is one full recording of a digit drawn in the air: an ordered
//! run of six-axis samples (linear acceleration x/y/z, angular rate x/y/z).
//!
//! Channel order is fixed everywhere in the system. The normalization
//! parameters and the classifier were fitted against `Channel::ALL` order, so
//! every conversion into or out of a column layout goes through this module.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of sensor channels in a capture
pub const CHANNEL_COUNT: usize = 6;

/// One scalar sensor axis, in canonical feature order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ax,
    Ay,
    Az,
    Gx,
    Gy,
    Gz,
}

impl Channel {
    /// All channels in canonical feature order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Ax,
        Channel::Ay,
        Channel::Az,
        Channel::Gx,
        Channel::Gy,
        Channel::Gz,
    ];

    /// Column index in a (T, F) tensor
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column header used in CSV exports
    pub fn column_name(self) -> &'static str {
        match self {
            Channel::Ax => "ax",
            Channel::Ay => "ay",
            Channel::Az => "az",
            Channel::Gx => "gx",
            Channel::Gy => "gy",
            Channel::Gz => "gz",
        }
    }

    /// Buffer name exposed by the phone-side sensor server
    pub fn buffer_name(self) -> &'static str {
        match self {
            Channel::Ax => "accX",
            Channel::Ay => "accY",
            Channel::Az => "accZ",
            Channel::Gx => "gyrX",
            Channel::Gy => "gyrY",
            Channel::Gz => "gyrZ",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Seconds since capture start (non-decreasing within a capture)
    pub timestamp: f64,
    /// Channel values in `Channel::ALL` order
    pub values: [f64; CHANNEL_COUNT],
}

impl RawSample {
    pub fn new(timestamp: f64, values: [f64; CHANNEL_COUNT]) -> Self {
        Self { timestamp, values }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.values[channel.index()]
    }
}

/// Ordered sequence of raw samples for a single digit attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    samples: Vec<RawSample>,
}

impl Capture {
    pub fn new(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    /// Build a capture from six equal-length channel columns
    ///
    /// # Errors
    /// * `InvalidInput` if any column length differs from `timestamps`
    pub fn from_columns(
        timestamps: &[f64],
        columns: [&[f64]; CHANNEL_COUNT],
    ) -> Result<Self> {
        if let Some(channel) = Channel::ALL
            .iter()
            .find(|c| columns[c.index()].len() != timestamps.len())
        {
            return Err(Error::InvalidInput(format!(
                "column '{}' has {} values, expected {}",
                channel,
                columns[channel.index()].len(),
                timestamps.len()
            )));
        }

        let samples = timestamps
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| {
                let mut values = [0.0; CHANNEL_COUNT];
                for (value, column) in values.iter_mut().zip(columns.iter()) {
                    *value = column[i];
                }
                RawSample::new(timestamp, values)
            })
            .collect();
        Ok(Self { samples })
    }

    /// Align phone buffers into a capture, see [`ChannelBuffers::into_capture`]
    pub fn from_buffers(buffers: ChannelBuffers, sampling_rate_hz: f64) -> Self {
        buffers.into_capture(sampling_rate_hz)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    /// Values of one channel in temporal order
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.get(channel)).collect()
    }

    /// Elapsed time between first and last sample, in seconds
    pub fn duration_seconds(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

/// Six per-channel sample buffers as fetched from the phone
///
/// Sensors sample independently, so buffers routinely arrive with different
/// lengths. Conversion into a `Capture` truncates every buffer to the shortest
/// one, discarding trailing samples of the longer channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelBuffers {
    buffers: [Vec<f64>; CHANNEL_COUNT],
}

impl ChannelBuffers {
    pub fn new(buffers: [Vec<f64>; CHANNEL_COUNT]) -> Self {
        Self { buffers }
    }

    pub fn get(&self, channel: Channel) -> &[f64] {
        &self.buffers[channel.index()]
    }

    /// Per-channel buffer lengths in `Channel::ALL` order
    pub fn lengths(&self) -> [usize; CHANNEL_COUNT] {
        let mut lengths = [0; CHANNEL_COUNT];
        for (len, buf) in lengths.iter_mut().zip(self.buffers.iter()) {
            *len = buf.len();
        }
        lengths
    }

    /// Minimum length across all six buffers
    pub fn common_len(&self) -> usize {
        self.buffers.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Truncate to the common length and attach synthetic timestamps
    /// (`index / sampling_rate_hz`)
    pub fn into_capture(self, sampling_rate_hz: f64) -> Capture {
        let n = self.common_len();
        let samples = (0..n)
            .map(|i| {
                let mut values = [0.0; CHANNEL_COUNT];
                for (value, buf) in values.iter_mut().zip(self.buffers.iter()) {
                    *value = buf[i];
                }
                RawSample::new(i as f64 / sampling_rate_hz, values)
            })
            .collect();
        Capture::new(samples)
    }
}
