//! Prometheus exporter for Virgin Media Hub cable-modem telemetry.
//!
//! The hub exposes a flat JSON map of OID strings to values at
//! `/getRouterStatus`. This crate polls that endpoint, translates the OIDs it
//! knows into gauges and republishes them on an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Hub status    │────>│   Translator    │────>│   HTTP Server   │
//! │ (HTTP + JSON)   │     │ (OID registry)  │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Keys are classified in order: DOCSIS event-log entries (prefix
//! [`oid::EVENT_LOG_PREFIX`]) become `virgin_docsis_event{event_id,description} 1`,
//! registered scalar OIDs become `{channel}`-labelled gauges, everything else is
//! ignored.
//!
//! # Usage
//!
//! ```bash
//! virgin-hub-exporter --config hub.json5
//! ```
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod error;
pub mod exposition;
pub mod http;
pub mod oid;
pub mod poller;
pub mod registry;
pub mod source;
pub mod translator;

pub use config::ExporterConfig;
pub use error::{RegistryError, ScrapeError};
pub use http::HttpServer;
pub use poller::ScrapePoller;
pub use registry::{MetricRegistry, SharedRegistry};
pub use source::{HttpSnapshotSource, SnapshotSource};
pub use translator::{RawSnapshot, Translator};

use config::{LogFormat, LoggingConfig};

/// Initialize tracing from logging configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}
