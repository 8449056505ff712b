mod classifier;
mod config;
mod detection_gate;
mod detection_log;
mod frame_id;
mod notifier;
mod server;

use anyhow::{Context, Result};
use classifier::HttpClassifier;
use config::Config;
use detection_gate::GateRegistry;
use detection_log::DetectionLog;
use notifier::SmsNotifier;
use server::AppState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration; a half-configured service must not
    // start accepting frames.
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "starting fauna-watch detection gateway"
    );

    init_metrics(config.service.metrics_port)?;

    let detection_log = Arc::new(
        DetectionLog::open(&config.storage.detection_log)
            .context("failed to open detection log")?,
    );

    let classifier = Arc::new(
        HttpClassifier::new(&config.classifier).context("failed to build classifier client")?,
    );

    let notifier = Arc::new(SmsNotifier::new(&config.notify));

    let state = AppState {
        classifier,
        notifier,
        gates: Arc::new(GateRegistry::new(config.gating.clone())),
        detection_log,
        frames_dir: PathBuf::from(&config.storage.frames_dir),
        destinations: Arc::new(config.notify.destinations.clone()),
        latest: Arc::new(RwLock::new(HashMap::new())),
    };

    let http_config = config.http.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(state, &http_config).await {
            tracing::error!(error = %e, "ingest server error");
        }
    });

    info!("detection gateway started");

    shutdown_signal().await;

    info!("shutting down detection gateway");
    server_handle.abort();

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C signal");
        }
        _ = terminate => {
            info!("received SIGTERM signal");
        }
    }
}
