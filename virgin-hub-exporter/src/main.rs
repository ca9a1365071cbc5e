//! Prometheus exporter for Virgin Media Hub telemetry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use virgin_hub_exporter::{
    ExporterConfig, HttpServer, HttpSnapshotSource, MetricRegistry, ScrapePoller, Translator,
    init_tracing,
};

/// Prometheus exporter for Virgin Media Hub telemetry.
#[derive(Parser, Debug)]
#[command(name = "virgin-hub-exporter")]
#[command(about = "Export Virgin Media Hub DOCSIS telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path))?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        device = %config.device.url,
        channel = %config.device.channel,
        "Starting Virgin Hub exporter"
    );

    // The registry must be complete before anything can read it.
    let registry = Arc::new(
        MetricRegistry::with_builtin(&config.metrics, config.events.max_series)
            .context("Invalid metric registry")?,
    );

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = HttpSnapshotSource::new(&config.device)?;
    let translator = Translator::new(registry.clone(), config.device.channel.clone());
    let poller = ScrapePoller::new(source, translator, config.device.poll_interval());
    let http_server = HttpServer::new(
        registry.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );

    let poller_task = tokio::spawn(poller.run(shutdown_rx.clone()));

    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = poller_task.await;
        let _ = http_task.await;
    })
    .await;

    let stats = registry.stats();
    info!(
        scrapes = stats.scrapes_total,
        failures = stats.scrape_failures_total,
        parse_errors = stats.parse_errors_total,
        series_count = registry.series_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
