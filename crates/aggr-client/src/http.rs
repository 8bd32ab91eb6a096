//! Shared HTTP plumbing for the backend clients

use std::time::Duration;

use aggr_core::Token;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a backend lives and how long to wait for it
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL; empty or `-` disables the backend
    pub url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, timeout: Duration, connect_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn is_disabled(&self) -> bool {
        let url = self.url.trim();
        url.is_empty() || url == "-"
    }
}

/// A reqwest client bound to one backend base URL
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    name: &'static str,
    client: Client,
    base_url: Option<Url>,
}

impl HttpBackend {
    pub(crate) fn new(name: &'static str, config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let base_url = if config.is_disabled() {
            None
        } else {
            let url = Url::parse(config.url.trim())?;
            if url.cannot_be_a_base() {
                return Err(ClientError::InvalidBaseUrl(config.url.clone()));
            }
            Some(url)
        };

        Ok(Self {
            name,
            client,
            base_url,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone().ok_or(ClientError::NotConfigured)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.name.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, token: &Token, url: Url) -> Result<T> {
        debug!(backend = self.name, %url, "GET");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token.as_str())
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub(crate) async fn post_json<B, T>(&self, token: &Token, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(backend = self.name, %url, "POST");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, token.as_str())
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// GET that hands back the raw response for callers with custom status rules
    pub(crate) async fn get_raw(&self, token: &Token, url: Url) -> Result<reqwest::Response> {
        debug!(backend = self.name, %url, "GET");
        Ok(self
            .client
            .get(url)
            .header(AUTHORIZATION, token.as_str())
            .send()
            .await?)
    }

    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(ClientError::body)
        } else {
            Err(extract_error_from_status(response, status).await)
        }
    }
}

/// Turn a failed response into a [`ClientError`], keeping the body text
pub(crate) async fn extract_error_from_status(
    response: reqwest::Response,
    status: StatusCode,
) -> ClientError {
    let message = match response.text().await {
        Ok(body) if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("HTTP {}", status),
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ClientError::Timeout,
        _ => ClientError::server_error(status.as_u16(), message),
    }
}
