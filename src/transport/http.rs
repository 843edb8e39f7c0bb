//! Changelog fetching over HTTP.

use super::ChangelogSource;
use crate::error::{RelayError, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::info;

/// Fetches the changelog with a blocking `reqwest` client.
pub struct HttpChangelogSource {
    client: Client,
}

impl HttpChangelogSource {
    /// Default whole-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self> {
        Self::with_timeouts(Self::DEFAULT_TIMEOUT, Self::DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("changelog-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ChangelogSource for HttpChangelogSource {
    fn fetch_text(&self, url: &str) -> Result<String> {
        info!(url, "Fetching changelog");

        let text = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| RelayError::Transport(format!("fetch {url}: {e}")))?;

        info!(chars = text.chars().count(), "Fetched changelog");
        Ok(text)
    }
}
