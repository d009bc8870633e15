//! Bootstrap configuration loading and resolution
//!
//! Configuration file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `AIRDRAW_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/airdraw/airdraw-ai.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing file found through steps 2-4 is not fatal: the compiled defaults
//! are used and a warning is logged. A file named explicitly on the command
//! line must exist. After loading, individual `AIRDRAW_*` environment
//! variables override single fields.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "AIRDRAW_CONFIG";
/// Environment override for `sensor.base_url`
pub const PHONE_URL_ENV_VAR: &str = "AIRDRAW_PHONE_URL";
/// Environment override for `model.classifier_url`
pub const CLASSIFIER_URL_ENV_VAR: &str = "AIRDRAW_CLASSIFIER_URL";
/// Environment override for `model.normalization_path`
pub const NORMALIZATION_ENV_VAR: &str = "AIRDRAW_NORMALIZATION";

const CONFIG_FILE_NAME: &str = "airdraw-ai.toml";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup; the process must restart to pick up changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Classifier and normalization artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Normalization artifact (`.npz` mean/std or `.json` stats/scaler)
    #[serde(default = "default_normalization_path")]
    pub normalization_path: PathBuf,

    /// Predict endpoint of the model server
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,

    /// Classifier request timeout
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,

    /// Fixed sequence length T the classifier was trained on
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
}

/// Phone-side sensor server and live acquisition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Base URL of the phone's sensor server
    #[serde(default = "default_sensor_base_url")]
    pub base_url: String,

    /// Nominal sampling rate used to synthesize timestamps
    #[serde(default = "default_sampling_rate_hz")]
    pub sampling_rate_hz: f64,

    /// Acquisition window
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Delay before recording starts so the user can get ready
    #[serde(default = "default_lead_in_ms")]
    pub lead_in_ms: u64,

    /// Per-request timeout for start/stop/get/clear
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// HTTP API host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_normalization_path() -> PathBuf {
    PathBuf::from("model/norm_stats.npz")
}

fn default_classifier_url() -> String {
    "http://127.0.0.1:8501/v1/models/airdraw:predict".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    10_000
}

fn default_sequence_length() -> usize {
    200
}

fn default_sensor_base_url() -> String {
    "http://192.0.0.4:8080".to_string()
}

fn default_sampling_rate_hz() -> f64 {
    100.0
}

fn default_window_ms() -> u64 {
    2000
}

fn default_lead_in_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            normalization_path: default_normalization_path(),
            classifier_url: default_classifier_url(),
            classifier_timeout_ms: default_classifier_timeout_ms(),
            sequence_length: default_sequence_length(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            base_url: default_sensor_base_url(),
            sampling_rate_hz: default_sampling_rate_hz(),
            window_ms: default_window_ms(),
            lead_in_ms: default_lead_in_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve, load, and apply environment overrides
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        let mut config = match cli_arg {
            Some(path) => {
                info!("Loading config from command line: {}", path.display());
                Self::load(path)?
            }
            None => match resolve_config_path() {
                Some(path) if path.exists() => {
                    info!("Loading config: {}", path.display());
                    Self::load(&path)?
                }
                Some(path) => {
                    warn!(
                        "Config file {} not found, using compiled defaults",
                        path.display()
                    );
                    Self::default()
                }
                None => {
                    warn!("No config directory available, using compiled defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `AIRDRAW_*` single-field overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(PHONE_URL_ENV_VAR) {
            info!("sensor.base_url overridden by {}", PHONE_URL_ENV_VAR);
            self.sensor.base_url = url;
        }
        if let Ok(url) = std::env::var(CLASSIFIER_URL_ENV_VAR) {
            info!("model.classifier_url overridden by {}", CLASSIFIER_URL_ENV_VAR);
            self.model.classifier_url = url;
        }
        if let Ok(path) = std::env::var(NORMALIZATION_ENV_VAR) {
            info!("model.normalization_path overridden by {}", NORMALIZATION_ENV_VAR);
            self.model.normalization_path = PathBuf::from(path);
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.model.sequence_length == 0 {
            return Err(Error::Config("model.sequence_length must be at least 1".to_string()));
        }
        if !(self.sensor.sampling_rate_hz.is_finite() && self.sensor.sampling_rate_hz > 0.0) {
            return Err(Error::Config(format!(
                "sensor.sampling_rate_hz must be positive, got {}",
                self.sensor.sampling_rate_hz
            )));
        }
        if self.sensor.window_ms == 0 {
            return Err(Error::Config("sensor.window_ms must be positive".to_string()));
        }
        if self.sensor.request_timeout_ms == 0 || self.model.classifier_timeout_ms == 0 {
            return Err(Error::Config("request timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

/// Locate the config file via `AIRDRAW_CONFIG` or the platform config dir
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    default_config_path()
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("airdraw").join(CONFIG_FILE_NAME))
}
