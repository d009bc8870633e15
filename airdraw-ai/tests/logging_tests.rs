//! Logging is live while the config file is resolved

mod helpers;

use airdraw_ai::logging::{reloadable_filter, BOOTSTRAP_LEVEL};
use airdraw_common::config::TomlConfig;
use helpers::log_capture::LogCapture;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

fn config_file(level: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[logging]\nlevel = \"{}\"", level).unwrap();
    file
}

#[test]
fn test_config_resolution_is_logged() {
    let file = config_file("warn");
    let capture = LogCapture::new();
    let (filter, handle) = reloadable_filter(EnvFilter::new(BOOTSTRAP_LEVEL), false);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(capture.clone());

    tracing::subscriber::with_default(subscriber, || {
        let config = TomlConfig::resolve(Some(file.path())).unwrap();
        handle.apply_level(&config.logging.level).unwrap();

        tracing::info!("info line after reload");
        tracing::warn!("warn line after reload");
    });

    capture.assert_contains("Loading config from command line");
    capture.assert_no_match("info line after reload");
    capture.assert_contains("warn line after reload");
}

#[test]
fn test_pinned_level_ignores_config() {
    let capture = LogCapture::new();
    let (filter, handle) = reloadable_filter(EnvFilter::new("debug"), true);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(capture.clone());

    tracing::subscriber::with_default(subscriber, || {
        handle.apply_level("error").unwrap();
        tracing::debug!("still visible");
    });

    assert!(handle.is_pinned());
    capture.assert_contains("still visible");
}

#[test]
fn test_invalid_level_rejected() {
    let (_filter, handle) = reloadable_filter(EnvFilter::new(BOOTSTRAP_LEVEL), false);
    assert!(handle.apply_level("airdraw_ai=loud").is_err());
}
