//! Status snapshot sources.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{COOKIE, REFERER, USER_AGENT};

use crate::config::DeviceConfig;
use crate::error::ScrapeError;
use crate::translator::RawSnapshot;

/// Something that can produce a raw status snapshot.
pub trait SnapshotSource: Send + Sync {
    /// Fetch one snapshot. Must not block longer than the source's timeout.
    fn fetch(&self) -> impl Future<Output = Result<RawSnapshot, ScrapeError>> + Send;

    /// Human-readable origin for logs.
    fn describe(&self) -> &str;
}

/// Fetches `getRouterStatus` from the hub over HTTP.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
    referer: String,
    user_agent: String,
    cookie: Option<String>,
}

impl HttpSnapshotSource {
    /// Build a source from device configuration.
    pub fn new(device: &DeviceConfig) -> Result<Self, ScrapeError> {
        Self::with_timeout(device, device.timeout())
    }

    /// Build a source with an explicit request timeout.
    pub fn with_timeout(device: &DeviceConfig, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            client,
            url: device.url.clone(),
            referer: device.referer.clone(),
            user_agent: device.user_agent.clone(),
            cookie: device.cookie.clone(),
        })
    }

    fn fetch_error(&self, source: reqwest::Error) -> ScrapeError {
        ScrapeError::Fetch {
            url: self.url.clone(),
            source,
        }
    }
}

impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<RawSnapshot, ScrapeError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referer);

        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.fetch_error(e))?;
        let snapshot: RawSnapshot = serde_json::from_slice(&body)?;
        Ok(snapshot)
    }

    fn describe(&self) -> &str {
        &self.url
    }
}
