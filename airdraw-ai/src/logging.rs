//! Tracing subscriber setup
//!
//! The subscriber is installed before the config file is read, so config
//! resolution is logged at the bootstrap level (`RUST_LOG`, else `info`).
//! Once the config is loaded, `logging.level` replaces the bootstrap filter
//! unless `RUST_LOG` was set.

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::{Error, Result};

/// Filter used until the configured level is known
pub const BOOTSTRAP_LEVEL: &str = "info";

/// Handle for replacing the bootstrap filter with the configured one
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set and wins over the config file
    pinned: bool,
}

impl LogLevelHandle {
    /// Switch to `level` (an `EnvFilter` directive such as `debug` or
    /// `airdraw_ai=trace`). No-op when pinned by `RUST_LOG`.
    pub fn apply_level(&self, level: &str) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        let filter = EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("Invalid logging.level '{}': {}", level, e)))?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::Config(format!("Failed to apply logging.level: {}", e)))
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

/// Reloadable filter layer starting at `initial`
pub fn reloadable_filter(
    initial: EnvFilter,
    pinned: bool,
) -> (reload::Layer<EnvFilter, Registry>, LogLevelHandle) {
    let (layer, handle) = reload::Layer::new(initial);
    (layer, LogLevelHandle { handle, pinned })
}

/// Install the global fmt subscriber with the bootstrap filter
pub fn init() -> Result<LogLevelHandle> {
    let (initial, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(BOOTSTRAP_LEVEL), false),
    };
    let (filter, handle) = reloadable_filter(initial, pinned);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))?;
    Ok(handle)
}
