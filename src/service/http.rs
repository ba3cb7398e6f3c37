use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::{AnalyseRequest, AnalyseResponse, DataService};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Talks to the analysis endpoint over HTTP, one JSON POST per request.
#[derive(Clone, Debug)]
pub struct HttpDataService {
    client: Client,
    url: String,
}

impl HttpDataService {
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataService for HttpDataService {
    async fn analyse(&self, request: &AnalyseRequest) -> Result<AnalyseResponse> {
        debug!("POST {} {:?}", self.url, request);
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach analysis service at {}", self.url))?;
        // Failures come back as JSON with `success: false`, often with a 5xx
        // status, so the body is parsed whatever the status.
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .context("Failed to read analysis service response")?;
        let parsed: AnalyseResponse = serde_json::from_slice(&body)
            .with_context(|| format!("Unexpected response from analysis service (HTTP {status})"))?;
        info!(
            "Analysis service answered HTTP {} with {} records",
            status,
            parsed.data.len()
        );
        Ok(parsed)
    }
}
