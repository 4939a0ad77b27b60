use std::time::Duration;

use chrono::Utc;

use super::{timestamped_message, PublishError, PublishOutcome};
use crate::config::Config;
use crate::git::{PushOutcome, Vcs};

const COMMIT_SUBJECT: &str = "Update latest LinkedIn post";

/// Parameters for publishing the fetched-post artifact.
#[derive(Debug, Clone)]
pub struct ArtifactPublish {
    /// Artifact path relative to the repository root.
    pub pathspec: String,
    pub remote: String,
    pub branch: String,
    /// Total push attempts; values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed wait after each rejected push except the last.
    pub backoff: Duration,
}

impl ArtifactPublish {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pathspec: super::images::to_pathspec(&config.artifact.path),
            remote: config.git.remote.clone(),
            branch: config.git.branch.clone(),
            max_attempts: config.git.max_push_attempts,
            backoff: config.git.backoff(),
        }
    }
}

/// Commit the artifact if it changed and push it, retrying on contention.
///
/// The commit is created exactly once and holds only the artifact, even if
/// other changes are staged in the working tree. Each attempt fetches the remote
/// branch, rebases the commit onto the observed tip and pushes with a lease
/// on that tip, so a writer that slipped in between fetch and push causes a
/// rejection instead of being overwritten. Only rejections are retried; every
/// other git error is returned immediately.
pub async fn publish_artifact<G: Vcs>(
    git: &G,
    job: &ArtifactPublish,
) -> Result<PublishOutcome, PublishError> {
    let changed = git.changed_paths(&job.pathspec).await?;
    if changed.is_empty() {
        tracing::info!(path = %job.pathspec, "Artifact unchanged, nothing to publish");
        return Ok(PublishOutcome::NoChanges);
    }

    let pathspecs = std::slice::from_ref(&job.pathspec);
    git.stage(pathspecs).await?;
    git.commit(&timestamped_message(COMMIT_SUBJECT, Utc::now()), pathspecs)
        .await?;
    tracing::info!(path = %job.pathspec, "Committed artifact");

    let max_attempts = job.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;

        let tip = git.fetch(&job.remote, &job.branch).await?;
        git.rebase_onto(&tip).await?;

        match git.push(&job.remote, &job.branch, Some(&tip)).await? {
            PushOutcome::Accepted => {
                tracing::info!(
                    attempts = attempt,
                    remote = %job.remote,
                    branch = %job.branch,
                    "Artifact pushed"
                );
                return Ok(PublishOutcome::Pushed { attempts: attempt });
            }
            PushOutcome::Rejected { reason } if attempt >= max_attempts => {
                tracing::error!(attempts = attempt, %reason, "Push retries exhausted");
                return Err(PublishError::RetriesExhausted {
                    attempts: attempt,
                    last_reason: reason,
                });
            }
            PushOutcome::Rejected { reason } => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_secs = job.backoff.as_secs_f64(),
                    %reason,
                    "Push rejected, remote moved; retrying"
                );
                tokio::time::sleep(job.backoff).await;
            }
        }
    }
}
