//! airdraw-ai - air-drawn digit recognition
//!
//! Subcommands:
//! - `predict [CSV]`: classify a CSV export (prompts for the path if omitted)
//! - `live`: record one capture from the phone and classify it
//! - `serve`: run the HTTP API (`/predict/csv`, `/predict/live`, `/events`, `/health`)

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use airdraw_ai::capture::{self, CaptureConfig, CaptureCoordinator, PhoneClient, SensorLink};
use airdraw_ai::logging;
use airdraw_ai::pipeline::InferenceContext;
use airdraw_ai::types::PredictionResult;
use airdraw_ai::AppState;
use airdraw_common::config::TomlConfig;
use airdraw_common::events::{AirdrawEvent, EventBus};

/// Command-line arguments for airdraw-ai
#[derive(Parser, Debug)]
#[command(name = "airdraw-ai")]
#[command(about = "Classify digits drawn in the air from phone motion sensors")]
#[command(version)]
struct Args {
    /// Config file (overrides AIRDRAW_CONFIG and the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a CSV capture
    Predict {
        /// CSV file with ax, ay, az, gx, gy, gz columns
        csv: Option<PathBuf>,
    },
    /// Record one capture from the phone and classify it
    Live,
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long, env = "AIRDRAW_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = logging::init().context("Failed to initialize logging")?;

    let config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Err(e) = log_level.apply_level(&config.logging.level) {
        warn!(error = %e, "Keeping bootstrap log level");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        normalization = %config.model.normalization_path.display(),
        classifier = %config.model.classifier_url,
        phone = %config.sensor.base_url,
        "Starting airdraw-ai"
    );

    let context = Arc::new(
        InferenceContext::from_config(&config.model)
            .context("Failed to initialize inference pipeline")?,
    );

    match args.command {
        Command::Predict { csv } => run_predict(&context, csv).await,
        Command::Live => run_live(&context, &config).await,
        Command::Serve { port } => run_serve(context, &config, port).await,
    }
}

async fn run_predict(context: &InferenceContext, csv: Option<PathBuf>) -> Result<()> {
    let path = match csv {
        Some(path) => path,
        None => prompt_for_path()?,
    };

    let capture = capture::load_csv(&path)?;
    let result = context.predict_capture(&capture).await?;
    print_result(&result);
    Ok(())
}

async fn run_live(context: &InferenceContext, config: &TomlConfig) -> Result<()> {
    let event_bus = EventBus::new(16);
    let mut coordinator =
        CaptureCoordinator::new(phone_link(config)?, CaptureConfig::from(&config.sensor))
            .with_events(event_bus.clone());

    let mut rx = event_bus.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                AirdrawEvent::CaptureStarted { window_ms, .. } => println!(
                    "Recording for {:.1} s... draw your digit now",
                    window_ms as f64 / 1000.0
                ),
                AirdrawEvent::CaptureStopped { .. } => println!("Recording stopped"),
                AirdrawEvent::CaptureFetched { samples, .. } => {
                    println!("Fetched {} samples", samples)
                }
                _ => {}
            }
        }
    });

    println!(
        "Get ready: recording starts in {:.1} s",
        config.sensor.lead_in_ms as f64 / 1000.0
    );
    let recorded = coordinator.record().await;
    drop(coordinator);
    drop(event_bus);
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress printer task failed");
    }

    let result = context.predict_capture(&recorded?).await?;
    print_result(&result);
    Ok(())
}

async fn run_serve(
    context: Arc<InferenceContext>,
    config: &TomlConfig,
    port: Option<u16>,
) -> Result<()> {
    let event_bus = EventBus::new(100);
    let coordinator =
        CaptureCoordinator::new(phone_link(config)?, CaptureConfig::from(&config.sensor));
    let state = AppState::new(context, coordinator, event_bus);
    let app = airdraw_ai::build_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server.host '{}'", config.server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(config.server.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn phone_link(config: &TomlConfig) -> Result<Arc<dyn SensorLink>> {
    let client = PhoneClient::new(
        config.sensor.base_url.clone(),
        Duration::from_millis(config.sensor.request_timeout_ms),
    )?;
    Ok(Arc::new(client))
}

fn prompt_for_path() -> Result<PathBuf> {
    print!("Enter the path of the digit CSV file: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        anyhow::bail!("no CSV path given");
    }
    Ok(PathBuf::from(trimmed))
}

fn print_result(result: &PredictionResult) {
    println!("Predicted digit: {}", result.digit);
    println!("Confidence: {:.4}", result.confidence);
    let formatted: Vec<String> = result
        .probabilities
        .iter()
        .enumerate()
        .map(|(digit, p)| format!("{}={:.4}", digit, p))
        .collect();
    println!("Probabilities: {}", formatted.join(" "));
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
