use std::path::Path;

use chrono::Utc;

use super::{timestamped_message, PublishError, PublishOutcome};
use crate::config::Config;
use crate::git::{PushOutcome, Vcs};

const COMMIT_SUBJECT: &str = "Add new images";

/// Parameters for publishing the watched image directory.
#[derive(Debug, Clone)]
pub struct ImagesPublish {
    /// Watched directory relative to the repository root.
    pub dir: String,
    /// Extension (without the dot) of the files to stage.
    pub extension: String,
    pub remote: String,
    pub branch: String,
}

impl ImagesPublish {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dir: to_pathspec(&config.images.dir),
            extension: config.images.extension.trim_start_matches('.').to_string(),
            remote: config.git.remote.clone(),
            branch: config.git.branch.clone(),
        }
    }

    /// Glob pathspec matching the image files to stage.
    pub fn pattern(&self) -> String {
        if self.dir.is_empty() {
            format!("*.{}", self.extension)
        } else {
            format!("{}/*.{}", self.dir, self.extension)
        }
    }

    /// Whether a repository-relative path is covered by [`Self::pattern`].
    ///
    /// Mirrors git's default glob pathspec, where `*` also crosses `/`.
    pub fn matches(&self, path: &str) -> bool {
        let in_dir = self.dir.is_empty()
            || path
                .strip_prefix(self.dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        let suffix = format!(".{}", self.extension);
        in_dir && path.ends_with(&suffix)
    }
}

/// Render a repository-relative path as a git pathspec.
pub(crate) fn to_pathspec(path: &Path) -> String {
    let spec = path.to_string_lossy().replace('\\', "/");
    let spec = spec.trim_end_matches('/');
    spec.strip_prefix("./").unwrap_or(spec).to_string()
}

/// Commit and push pending changes under the image directory.
///
/// With no changes under the directory this returns
/// [`PublishOutcome::NoChanges`] without touching the index. Otherwise the
/// matching images are staged (a failing stage, e.g. no file matching the
/// pattern, is logged and ignored), committed once and pushed once. Changes
/// that only touch files outside the pattern also end in
/// [`PublishOutcome::NoChanges`], since there is nothing to commit. A
/// rejected push is reported as [`PublishError::PushRejected`]; there is no
/// retry.
pub async fn publish_images<G: Vcs>(
    git: &G,
    job: &ImagesPublish,
) -> Result<PublishOutcome, PublishError> {
    let watched = if job.dir.is_empty() { "." } else { job.dir.as_str() };
    let changed = git.changed_paths(watched).await?;
    if changed.is_empty() {
        tracing::info!(dir = %watched, "No changes in image directory");
        return Ok(PublishOutcome::NoChanges);
    }
    tracing::info!(dir = %watched, changed = changed.len(), "Found image changes");

    let pattern = job.pattern();
    let pathspecs = std::slice::from_ref(&pattern);
    if let Err(e) = git.stage(pathspecs).await {
        tracing::warn!(%pattern, error = %e, "Staging images failed, continuing");
    }

    let images = changed.iter().filter(|e| job.matches(&e.path)).count();
    if images == 0 {
        tracing::info!(%pattern, changed = changed.len(), "No changes matching image pattern");
        return Ok(PublishOutcome::NoChanges);
    }

    git.commit(&timestamped_message(COMMIT_SUBJECT, Utc::now()), pathspecs)
        .await?;
    tracing::info!(images, "Committed images");

    match git.push(&job.remote, &job.branch, None).await? {
        PushOutcome::Accepted => {
            tracing::info!(remote = %job.remote, branch = %job.branch, "Images pushed");
            Ok(PublishOutcome::Pushed { attempts: 1 })
        }
        PushOutcome::Rejected { reason } => Err(PublishError::PushRejected(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pattern() {
        let job = ImagesPublish::from_config(&Config::default());
        assert_eq!(job.dir, "images");
        assert_eq!(job.pattern(), "images/*.jpeg");
    }

    #[test]
    fn test_matches_pattern() {
        let job = ImagesPublish::from_config(&Config::default());
        assert!(job.matches("images/2025-03-06.jpeg"));
        assert!(job.matches("images/2025/03/06.jpeg"));
        assert!(!job.matches("images/notes.txt"));
        assert!(!job.matches("images/photo.JPEG"));
        assert!(!job.matches("imagesextra/a.jpeg"));
        assert!(!job.matches("other/a.jpeg"));

        let root = ImagesPublish {
            dir: String::new(),
            ..job
        };
        assert!(root.matches("a.jpeg"));
    }

    #[test]
    fn test_extension_leading_dot_is_dropped() {
        let mut config = Config::default();
        config.images.extension = ".png".to_string();
        assert_eq!(ImagesPublish::from_config(&config).pattern(), "images/*.png");
    }

    #[test]
    fn test_to_pathspec_normalizes() {
        assert_eq!(to_pathspec(&PathBuf::from("./images/")), "images");
        assert_eq!(to_pathspec(&PathBuf::from("assets/photos")), "assets/photos");
        assert_eq!(to_pathspec(&PathBuf::from("last_linkedin_post.json")), "last_linkedin_post.json");
    }
}
