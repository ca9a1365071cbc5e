//! Error types for the hub exporter.

use thiserror::Error;

/// Errors raised while fetching a status snapshot.
///
/// Apart from [`ScrapeError::Client`], which can only occur at startup, these
/// abort a single cycle: the poller logs them and retries on the next
/// interval, leaving every series at its previous value.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection failure, timeout, or a body that could not be read.
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success status.
    #[error("Device returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The body was not a flat JSON object of string values.
    #[error("Failed to decode status snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised while building or writing into the metric registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The same OID was mapped to two metrics.
    #[error("OID {oid} is already registered as {existing}")]
    DuplicateOid { oid: String, existing: String },

    /// Two families share a metric name.
    #[error("Metric name {0} is already registered")]
    DuplicateName(String),

    /// A write supplied the wrong number of label values.
    #[error("Metric {name} expects {expected} label values, got {actual}")]
    LabelArity {
        name: String,
        expected: usize,
        actual: usize,
    },
}
