//! CSV capture loader
//!
//! Reads a sensor export with at least the columns `ax, ay, az, gx, gy, gz`
//! (exact names, surrounding whitespace ignored). Row order is temporal
//! order. An optional `timestamp` column is carried through; without one,
//! timestamps are synthesized at the nominal sampling rate. Extra columns are
//! ignored.

use crate::error::{Error, Result};
use airdraw_common::{Capture, Channel, RawSample, CHANNEL_COUNT};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Rate assumed for synthetic timestamps when the file has none
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 100.0;

const TIMESTAMP_COLUMN: &str = "timestamp";

/// Load a capture from a CSV file
pub fn load_csv(path: &Path) -> Result<Capture> {
    debug!(path = %path.display(), "Loading CSV capture");
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Csv(format!("Failed to open {}: {}", path.display(), e)))?;
    read_csv(file)
}

/// Read a capture from any CSV source
pub fn read_csv<R: Read>(reader: R) -> Result<Capture> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::Csv(format!("Failed to read header: {}", e)))?
        .clone();

    let mut columns = [0usize; CHANNEL_COUNT];
    for channel in Channel::ALL {
        columns[channel.index()] = headers
            .iter()
            .position(|h| h == channel.column_name())
            .ok_or_else(|| {
                Error::Csv(format!("missing required column '{}'", channel.column_name()))
            })?;
    }
    let timestamp_column = headers.iter().position(|h| h == TIMESTAMP_COLUMN);

    let mut samples = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| Error::Csv(format!("row {}: {}", row + 1, e)))?;

        let mut values = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            values[channel.index()] =
                parse_field(&record, columns[channel.index()], channel.column_name(), row)?;
        }
        let timestamp = match timestamp_column {
            Some(col) => parse_field(&record, col, TIMESTAMP_COLUMN, row)?,
            None => row as f64 / DEFAULT_SAMPLING_RATE_HZ,
        };

        samples.push(RawSample::new(timestamp, values));
    }

    debug!(samples = samples.len(), "CSV capture loaded");
    Ok(Capture::new(samples))
}

fn parse_field(record: &csv::StringRecord, col: usize, name: &str, row: usize) -> Result<f64> {
    let raw = record
        .get(col)
        .ok_or_else(|| Error::Csv(format!("row {}: missing value for '{}'", row + 1, name)))?;
    raw.parse::<f64>().map_err(|_| {
        Error::Csv(format!(
            "row {}: column '{}' value '{}' is not a number",
            row + 1,
            name,
            raw
        ))
    })
}
