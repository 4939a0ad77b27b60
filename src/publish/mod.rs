//! Publishing local changes to the shared remote branch.
//!
//! - [`publish_artifact`] commits the fetched-post artifact and pushes it
//!   with an optimistic compare-and-swap loop that tolerates concurrent
//!   writers.
//! - [`publish_images`] commits new images and pushes once, without retry.

mod artifact;
mod images;

pub use artifact::{publish_artifact, ArtifactPublish};
pub use images::{publish_images, ImagesPublish};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::git::GitError;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Any git failure other than push contention.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Every push attempt lost the race against another writer.
    #[error("push rejected {attempts} times in a row; giving up (last: {last_reason})")]
    RetriesExhausted { attempts: u32, last_reason: String },

    /// A single-shot push was refused by the remote.
    #[error("push rejected by remote: {0}")]
    PushRejected(String),
}

/// Outcome of a publish flow that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing changed; no commit was created and nothing was pushed.
    NoChanges,
    /// One commit was created and accepted by the remote.
    Pushed {
        /// Total push attempts, including the accepted one.
        attempts: u32,
    },
}

/// Commit message with a UTC timestamp suffix.
pub(crate) fn timestamped_message(subject: &str, now: DateTime<Utc>) -> String {
    format!("{subject} ({})", now.format("%Y-%m-%d %H:%M:%S UTC"))
}
