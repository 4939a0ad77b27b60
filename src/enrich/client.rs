use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::EnrichError;
use crate::config::EnrichConfig;
use crate::util::{read_limited_bytes, validate_api_base_url};

const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<Message<'a>>,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: &'a str },
}

/// Client for a Responses-style text generation endpoint.
pub struct ResponsesClient {
    http: reqwest::Client,
    url: Url,
    model: String,
    api_key: SecretString,
    retry_base_delay: Duration,
}

impl ResponsesClient {
    pub fn new(
        http: reqwest::Client,
        config: &EnrichConfig,
        api_key: SecretString,
    ) -> Result<Self, EnrichError> {
        let url = validate_api_base_url(&config.api_base_url)?;
        Ok(Self {
            http,
            url,
            model: config.model.clone(),
            api_key,
            retry_base_delay: Duration::from_secs(1),
        })
    }

    /// First back-off delay for transient failures; doubles on each retry.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Send one system + user exchange and return the reply text.
    ///
    /// `image_url` attaches an image to the user turn. Timeouts, network
    /// errors, 429 and 5xx are retried with exponential backoff.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        image_url: Option<&str>,
        max_output_tokens: u32,
    ) -> Result<String, EnrichError> {
        let mut user_parts = vec![ContentPart::InputText { text: user }];
        if let Some(image_url) = image_url {
            user_parts.push(ContentPart::InputImage { image_url });
        }
        let request = ResponsesRequest {
            model: &self.model,
            input: vec![
                Message {
                    role: "system",
                    content: vec![ContentPart::InputText { text: system }],
                },
                Message {
                    role: "user",
                    content: user_parts,
                },
            ],
            temperature: TEMPERATURE,
            max_output_tokens,
        };
        let body = serde_json::to_vec(&request)?;

        let mut retry_count = 0;
        loop {
            match self.post_once(body.clone()).await {
                Ok(bytes) => {
                    let reply: serde_json::Value = serde_json::from_slice(&bytes)?;
                    return Ok(output_text(&reply));
                }
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_base_delay * (1u32 << retry_count);
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying model request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, body: Vec<u8>) -> Result<Vec<u8>, EnrichError> {
        let request = self
            .http
            .post(self.url.clone())
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .body(body);

        let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| EnrichError::Timeout)?
            .map_err(EnrichError::Network)?;

        tracing::debug!(status = response.status().as_u16(), "Model API response");
        if !response.status().is_success() {
            return Err(EnrichError::HttpStatus(response.status().as_u16()));
        }

        Ok(read_limited_bytes(response, MAX_RESPONSE_SIZE).await?)
    }
}

/// Text of a Responses API reply.
///
/// Prefers a top-level `output_text`; otherwise joins every `output_text`
/// part of the `output` messages.
fn output_text(reply: &serde_json::Value) -> String {
    if let Some(text) = reply.get("output_text").and_then(serde_json::Value::as_str) {
        return text.trim().to_string();
    }
    reply
        .get("output")
        .and_then(serde_json::Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(serde_json::Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(serde_json::Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
        .collect::<String>()
        .trim()
        .to_string()
}
