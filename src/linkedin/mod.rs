//! Fetching the latest LinkedIn post into the repository artifact.
//!
//! - [`client`] talks to the member change-log API
//! - [`post`] selects the newest post, renders it and matches its images
//!
//! [`fetch_latest_post`] ties both together and writes the artifact file.

mod client;
mod post;

pub use client::{ChangeLog, ChangeLogElement, FetchError, LinkedInClient, TokenStatus};
pub use post::{
    captured_at, format_published_at, image_url, matching_images, post_text, post_url,
    render_html, select_latest, to_artifact_json, LatestPost, PostImage,
};

use chrono::{Duration, Utc};
use std::path::Path;

use crate::config::Config;
use crate::util::atomic_write;

/// Fetch the newest post and overwrite the artifact under `repo`.
///
/// Returns `Ok(None)` and leaves the artifact untouched when the change log
/// holds no post creation in the lookback window.
pub async fn fetch_latest_post(
    client: &LinkedInClient,
    config: &Config,
    repo: &Path,
) -> Result<Option<LatestPost>, FetchError> {
    let since = Utc::now() - Duration::days(i64::from(config.linkedin.lookback_days));
    let changelog = client
        .member_changelog(since.timestamp_millis(), config.linkedin.page_size)
        .await?;

    let Some(element) = select_latest(&changelog) else {
        tracing::info!(
            elements = changelog.elements.len(),
            lookback_days = config.linkedin.lookback_days,
            "No posts found"
        );
        return Ok(None);
    };

    let Some(published) = captured_at(element) else {
        tracing::warn!(captured_at = element.captured_at, "Post timestamp out of range, skipping");
        return Ok(None);
    };

    let date = published.format("%Y-%m-%d").to_string();
    let images_dir = repo.join(&config.images.dir);
    let images = matching_images(&images_dir, &date, &config.images.extension)?
        .into_iter()
        .map(|name| PostImage {
            url: image_url(
                config.images.base_url.as_deref(),
                &config.images.dir,
                &name,
            ),
            alt: String::new(),
        })
        .collect();

    let post = LatestPost {
        content: render_html(post_text(element)),
        url: post_url(element),
        published_at: format_published_at(published),
        images,
    };

    let json = to_artifact_json(&post)?;
    let artifact_path = repo.join(&config.artifact.path);
    atomic_write(&artifact_path, json.as_bytes())
        .map_err(|e| FetchError::Artifact(format!("{e:#}")))?;

    tracing::info!(
        path = %artifact_path.display(),
        url = %post.url,
        published_at = %post.published_at,
        images = post.images.len(),
        "Saved latest post"
    );
    Ok(Some(post))
}
