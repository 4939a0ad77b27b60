//! Optional enrichment of the fetched post.
//!
//! Reads the artifact, asks a language model for an SEO headline and
//! description and for alt text of images that have none, and writes the
//! result to a separate file. The artifact itself is never modified.

mod client;
mod prompts;
mod text;

pub use client::ResponsesClient;
pub use prompts::{load_prompt_set, PromptSet};
pub use text::{
    parse_seo_reply, sanitize, soft_trim, strip_html_to_text, Seo, DESC_MAX, HEADLINE_MAX,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::linkedin::LatestPost;
use crate::util::{atomic_write, BodyError, UrlValidationError};

const SEO_MAX_OUTPUT_TOKENS: u32 = 200;
const ALT_MAX_OUTPUT_TOKENS: u32 = 60;
/// Characters of post text sent with the SEO prompt.
const SEO_CONTENT_CHARS: usize = 4000;
/// Characters of post text sent as context with each alt-text prompt.
const ALT_CONTEXT_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Model request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("Invalid API base URL: {0}")]
    BaseUrl(#[from] UrlValidationError),
    #[error("No API key: set OPENAI_API_KEY or enrich.api_key")]
    MissingApiKey,
    #[error("Prompt file: {0}")]
    Prompts(String),
    #[error("Cannot read artifact {path}: {reason}")]
    Input { path: String, reason: String },
    #[error("Failed to write enriched post: {0}")]
    Output(String),
}

impl From<BodyError> for EnrichError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge(limit) => EnrichError::ResponseTooLarge(limit),
            BodyError::Network(e) => EnrichError::Network(e),
        }
    }
}

impl EnrichError {
    fn is_retryable(&self) -> bool {
        match self {
            EnrichError::Timeout | EnrichError::Network(_) => true,
            EnrichError::HttpStatus(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The artifact plus generated SEO fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    #[serde(flatten)]
    pub post: LatestPost,
    pub seo: Seo,
}

/// Enrich the artifact at `input` and write the result to `output`.
///
/// SEO generation failing is an error. A failed alt-text request is logged
/// and leaves that image's `alt` empty. Images that already carry alt text
/// are left alone.
pub async fn enrich_post(
    client: &ResponsesClient,
    prompts: &PromptSet,
    input: &Path,
    output: &Path,
) -> Result<EnrichedPost, EnrichError> {
    let input_error = |reason: String| EnrichError::Input {
        path: input.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(input).map_err(|e| input_error(e.to_string()))?;
    let mut post: LatestPost =
        serde_json::from_str(&raw).map_err(|e| input_error(e.to_string()))?;

    let plain = strip_html_to_text(&post.content);

    let headline_max = HEADLINE_MAX.to_string();
    let desc_max = DESC_MAX.to_string();
    let seo_user = text::fill_placeholders(
        &prompts.seo_user,
        &[
            ("CONTENT", text::truncate_chars(&plain, SEO_CONTENT_CHARS)),
            ("HEADLINE_MAX", headline_max.as_str()),
            ("TITLE_MAX", headline_max.as_str()),
            ("DESC_MAX", desc_max.as_str()),
        ],
    );
    let reply = client
        .complete(&prompts.seo_system, &seo_user, None, SEO_MAX_OUTPUT_TOKENS)
        .await?;
    let seo = parse_seo_reply(&reply);
    tracing::info!(headline = %seo.headline, description = %seo.description, "Generated SEO fields");

    let alt_user = text::fill_placeholders(
        &prompts.alt_user,
        &[("CONTEXT", text::truncate_chars(&plain, ALT_CONTEXT_CHARS))],
    );
    let mut generated = 0;
    for image in &mut post.images {
        if image.url.is_empty() {
            continue;
        }
        if !image.alt.trim().is_empty() {
            tracing::debug!(url = %image.url, "Image already has alt text");
            continue;
        }
        match client
            .complete(
                &prompts.alt_system,
                &alt_user,
                Some(image.url.as_str()),
                ALT_MAX_OUTPUT_TOKENS,
            )
            .await
        {
            Ok(alt) => {
                image.alt = sanitize(&alt);
                generated += 1;
                tracing::info!(url = %image.url, alt = %image.alt, "Generated alt text");
            }
            Err(e) => tracing::warn!(url = %image.url, error = %e, "Alt text generation failed"),
        }
    }

    let enriched = EnrichedPost { post, seo };
    let mut json = serde_json::to_string_pretty(&enriched)?;
    json.push('\n');
    atomic_write(output, json.as_bytes()).map_err(|e| EnrichError::Output(format!("{e:#}")))?;

    tracing::info!(path = %output.display(), alt_generated = generated, "Saved enriched post");
    Ok(enriched)
}
