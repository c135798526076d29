//! Reachability probing.

use std::time::Duration;

use super::ConnectivityMonitor;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 4;

/// Source of raw reachability readings.
#[allow(async_fn_in_trait)]
pub trait ReachabilityProbe {
    /// `Some(true)` reachable, `Some(false)` unreachable, `None` indeterminate.
    async fn check(&self) -> Option<bool>;
}

/// Probe that issues a `HEAD` request against a known endpoint.
///
/// Any HTTP response counts as reachable; connect errors and timeouts count
/// as unreachable.
#[derive(Debug, Clone)]
pub struct HttpReachabilityProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpReachabilityProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = normalize_text_option(Some(url.into())).ok_or_else(|| {
            Error::InvalidInput("Probe URL must not be empty".to_string())
        })?;
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "Probe URL must include http:// or https://".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Network(format!("Failed to build probe client: {error}")))?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReachabilityProbe for HttpReachabilityProbe {
    async fn check(&self) -> Option<bool> {
        match self.client.head(&self.url).send().await {
            Ok(_) => Some(true),
            Err(error) if error.is_builder() => {
                tracing::warn!("Reachability probe misconfigured: {error}");
                None
            }
            Err(error) => {
                tracing::debug!("Reachability probe failed: {error}");
                Some(false)
            }
        }
    }
}

/// Feed `probe` readings into `monitor` every `interval`, forever.
pub async fn watch_reachability<P: ReachabilityProbe>(
    monitor: ConnectivityMonitor,
    probe: P,
    interval: Duration,
) {
    loop {
        monitor.report(probe.check().await);
        tokio::time::sleep(interval).await;
    }
}
