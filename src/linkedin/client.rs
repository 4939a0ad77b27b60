use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::LinkedInConfig;
use crate::util::{read_limited_bytes, validate_api_base_url, BodyError, UrlValidationError};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 3;

/// Page size used when only probing whether the token works.
const TOKEN_CHECK_COUNT: u32 = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed change-log response: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("Invalid API base URL: {0}")]
    BaseUrl(#[from] UrlValidationError),
    #[error("No LinkedIn access token: set LINKEDIN_ACCESS_TOKEN or linkedin.access_token")]
    MissingToken,
    #[error("Failed to write artifact: {0}")]
    Artifact(String),
    #[error("Failed to read image directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BodyError> for FetchError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge(limit) => FetchError::ResponseTooLarge(limit),
            BodyError::Network(e) => FetchError::Network(e),
        }
    }
}

impl FetchError {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::ResponseTooLarge(_)
            | FetchError::InvalidBody(_)
            | FetchError::BaseUrl(_)
            | FetchError::MissingToken
            | FetchError::Artifact(_)
            | FetchError::Io(_) => false,
        }
    }
}

/// One page of the member change log.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeLog {
    #[serde(default)]
    pub elements: Vec<ChangeLogElement>,
}

/// A single change-log entry. Only the fields the post selection reads are
/// typed; the activity payload stays as raw JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogElement {
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub resource_id: serde_json::Value,
    /// Epoch milliseconds.
    #[serde(default)]
    pub captured_at: i64,
    #[serde(default)]
    pub activity: serde_json::Value,
}

/// What the API said about the configured token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    /// 401: expired or revoked.
    Invalid,
    Unexpected(u16),
}

/// Client for the LinkedIn member change-log endpoint.
pub struct LinkedInClient {
    http: reqwest::Client,
    base_url: Url,
    version: String,
    token: SecretString,
    retry_base_delay: Duration,
}

impl LinkedInClient {
    /// Build a client, refusing base URLs that would expose the token.
    pub fn new(
        http: reqwest::Client,
        config: &LinkedInConfig,
        token: SecretString,
    ) -> Result<Self, FetchError> {
        let base_url = validate_api_base_url(&config.api_base_url)?;
        Ok(Self {
            http,
            base_url,
            version: config.version.clone(),
            token,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// First back-off delay for transient failures; doubles on each retry.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn changelog_url(&self, count: u32, start_time_ms: Option<i64>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", "memberAndApplication");
            query.append_pair("count", &count.to_string());
            if let Some(start) = start_time_ms {
                query.append_pair("startTime", &start.to_string());
            }
        }
        url
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header("LinkedIn-Version", &self.version)
    }

    /// Fetch change-log entries captured since `start_time_ms`.
    ///
    /// Transient failures (timeouts, network errors, 5xx) are retried with
    /// exponential backoff, up to 3 retries.
    pub async fn member_changelog(
        &self,
        start_time_ms: i64,
        count: u32,
    ) -> Result<ChangeLog, FetchError> {
        let url = self.changelog_url(count, Some(start_time_ms));
        let mut retry_count = 0;

        loop {
            match self.fetch_once(url.clone()).await {
                Ok(bytes) => {
                    let changelog: ChangeLog = serde_json::from_slice(&bytes)?;
                    tracing::debug!(elements = changelog.elements.len(), "Fetched change log");
                    return Ok(changelog);
                }
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_base_delay * (1u32 << retry_count);
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying change-log fetch after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ask the API whether the configured token is accepted.
    pub async fn check_token(&self) -> Result<TokenStatus, FetchError> {
        let url = self.changelog_url(TOKEN_CHECK_COUNT, None);
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.request(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status().as_u16();
        if let Ok(bytes) = read_limited_bytes(response, MAX_RESPONSE_SIZE).await {
            tracing::debug!(status, body = %String::from_utf8_lossy(&bytes), "Token check response");
        }

        Ok(match status {
            200 => TokenStatus::Valid,
            401 => TokenStatus::Invalid,
            other => TokenStatus::Unexpected(other),
        })
    }

    async fn fetch_once(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.request(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        tracing::info!(status = response.status().as_u16(), "LinkedIn API response");
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        Ok(read_limited_bytes(response, MAX_RESPONSE_SIZE).await?)
    }
}
