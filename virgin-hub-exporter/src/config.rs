//! Configuration for the hub exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::exposition::is_valid_metric_name;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Hub connection settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// DOCSIS event-log settings.
    #[serde(default)]
    pub events: EventConfig,

    /// Additional OID mappings on top of the built-in table.
    #[serde(default)]
    pub metrics: Vec<MetricMapping>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hub status endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Status endpoint URL (default: "http://192.168.0.1/getRouterStatus").
    #[serde(default = "default_url")]
    pub url: String,

    /// Referer header; the hub rejects requests without one.
    #[serde(default = "default_referer")]
    pub referer: String,

    /// User-Agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional session cookie sent as the Cookie header.
    #[serde(default)]
    pub cookie: Option<String>,

    /// Channel label attached to every scalar series (default: "706").
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause between scrape cycles in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_url() -> String {
    "http://192.168.0.1/getRouterStatus".to_string()
}

fn default_referer() -> String {
    "http://192.168.0.1/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_channel() -> String {
    "706".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            referer: default_referer(),
            user_agent: default_user_agent(),
            cookie: None,
            channel: default_channel(),
            timeout_secs: default_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl DeviceConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pause between cycles as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9877").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9877".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// DOCSIS event-log configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventConfig {
    /// Maximum distinct `(event_id, description)` series. Unbounded when unset.
    #[serde(default)]
    pub max_series: Option<usize>,
}

/// A scalar OID mapping supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricMapping {
    /// Exact OID key as emitted by the hub.
    pub oid: String,
    /// Prometheus metric name.
    pub name: String,
    /// Help text.
    #[serde(default)]
    pub help: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match reqwest::Url::parse(&self.device.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Invalid device url: {}",
                    self.device.url
                )));
            }
        }

        if self.device.channel.trim().is_empty() {
            return Err(ConfigError::Validation(
                "device.channel must not be empty".to_string(),
            ));
        }

        if self.device.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        if self.device.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.events.max_series == Some(0) {
            return Err(ConfigError::Validation(
                "events.max_series must be > 0".to_string(),
            ));
        }

        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        for mapping in &self.metrics {
            if mapping.oid.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Metric {} has an empty oid",
                    mapping.name
                )));
            }
            if !is_valid_metric_name(&mapping.name) {
                return Err(ConfigError::Validation(format!(
                    "Invalid metric name: {}",
                    mapping.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.device.url, "http://192.168.0.1/getRouterStatus");
        assert_eq!(config.device.referer, "http://192.168.0.1/");
        assert_eq!(config.device.channel, "706");
        assert_eq!(config.device.timeout(), Duration::from_secs(5));
        assert_eq!(config.device.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.prometheus.listen, "0.0.0.0:9877");
        assert_eq!(config.prometheus.path, "/metrics");
        assert!(config.events.max_series.is_none());
        assert!(config.metrics.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            device: {
                url: "http://10.0.0.1/getRouterStatus",
                referer: "http://10.0.0.1/",
                user_agent: "hub-exporter/1.0",
                cookie: "SessionID=abc",
                channel: "12",
                timeout_secs: 2,
                poll_interval_secs: 60,
            },
            prometheus: {
                listen: "127.0.0.1:9100",
                path: "/hub/metrics",
            },
            events: { max_series: 500 },
            metrics: [
                { oid: "1.3.6.1.2.1.10.127.1.1.1.1.6.3", name: "virgin_downstream_power_dbmv", help: "Downstream power" },
            ],
            logging: {
                level: "debug",
                format: "json",
            },
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.device.url, "http://10.0.0.1/getRouterStatus");
        assert_eq!(config.device.user_agent, "hub-exporter/1.0");
        assert_eq!(config.device.cookie.as_deref(), Some("SessionID=abc"));
        assert_eq!(config.device.channel, "12");
        assert_eq!(config.device.timeout_secs, 2);
        assert_eq!(config.device.poll_interval_secs, 60);
        assert_eq!(config.prometheus.listen, "127.0.0.1:9100");
        assert_eq!(config.prometheus.path, "/hub/metrics");
        assert_eq!(config.events.max_series, Some(500));
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.metrics[0].name, "virgin_downstream_power_dbmv");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ device: {{ channel: \"42\" }} }}").unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.device.channel, "42");
    }

    #[test]
    fn test_shipped_example_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/hub.json5");
        let config = ExporterConfig::load_from_file(path).unwrap();
        assert_eq!(config.prometheus.listen, "0.0.0.0:9877");
        assert_eq!(config.device.channel, "706");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/hub.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validate_invalid_url() {
        let result = ExporterConfig::parse(r#"{ device: { url: "ftp://hub/status" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid device url")
        );
    }

    #[test]
    fn test_validate_invalid_listen() {
        let result = ExporterConfig::parse(r#"{ prometheus: { listen: "not-an-address" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let result = ExporterConfig::parse(r#"{ prometheus: { path: "metrics" } }"#);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_zero_intervals() {
        assert!(ExporterConfig::parse("{ device: { timeout_secs: 0 } }").is_err());
        assert!(ExporterConfig::parse("{ device: { poll_interval_secs: 0 } }").is_err());
        assert!(ExporterConfig::parse("{ events: { max_series: 0 } }").is_err());
    }

    #[test]
    fn test_validate_bad_metric_name() {
        let json = r#"{ metrics: [{ oid: "1.2.3", name: "9bad-name" }] }"#;
        assert!(
            ExporterConfig::parse(json)
                .unwrap_err()
                .to_string()
                .contains("Invalid metric name")
        );
    }
}
