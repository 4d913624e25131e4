use std::time::Duration;

use reqwest::blocking::Client;

use super::{HardwareSource, Node, DEFAULT_ENDPOINT, ENDPOINT_ENV};
use crate::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

/// Fetches `data.json` from a Libre Hardware Monitor web server.
pub struct HttpSource {
    url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidArgs(format!("http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HardwareSource for HttpSource {
    fn fetch(&self) -> Result<Node> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| Error::SourceUnavailable(format!("request LHM data: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "request LHM data: status {status}"
            )));
        }
        let body = response
            .text()
            .map_err(|e| Error::SourceUnavailable(format!("read LHM response: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("decode LHM response: {e}")))
    }
}

/// Endpoint from `LHM_ENDPOINT` when set, otherwise `fallback`.
pub fn endpoint_from_env(fallback: Option<&str>) -> String {
    std::env::var(ENDPOINT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}
