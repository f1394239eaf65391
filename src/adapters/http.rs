use crate::config::toml_config::ProbeSection;
use crate::domain::model::{FetchError, FetchResponse};
use crate::domain::ports::Fetcher;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Plain HTTP GET against the probe page through one pooled client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(section: &ProbeSection) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&section.user_agent)
            .timeout(Duration::from_secs(section.timeout_seconds))
            .pool_max_idle_per_host(section.pool_max_idle_per_host)
            .build()?;
        Ok(Self { client })
    }
}

fn classify_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_body() || err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Connect(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        let status = response.status().as_u16();
        tracing::trace!("GET {} -> {}", url, status);

        let body = response.text().await.map_err(|e| classify_error(&e))?;
        Ok(FetchResponse { status, body })
    }
}
