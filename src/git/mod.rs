//! Version-control primitives used by the publish flows.
//!
//! The publish logic only talks to the [`Vcs`] trait. [`CommandGit`] is the
//! production implementation that shells out to the system `git` binary;
//! tests substitute a scripted in-memory implementation.
//!
//! The remote branch is treated as an append-only log: [`Vcs::fetch`] reports
//! the tip it observed, and [`Vcs::push`] with a lease only succeeds if the
//! remote still points at that tip.

mod commands;
mod status;

pub use commands::CommandGit;
pub use status::{parse_porcelain_z, StatusEntry};

use thiserror::Error;

/// Errors raised by git operations. None of these are retried.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary could not be started.
    #[error("failed to spawn git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// git ran and exited non-zero. `stderr` falls back to stdout when git
    /// reported on stdout only (e.g. `nothing to commit`).
    #[error("git {command} failed (status {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Replaying the local commit on the fetched tip produced conflicts.
    #[error("rebase onto {upstream} hit conflicts: {stderr}")]
    RebaseConflict { upstream: String, stderr: String },

    /// git produced output we could not interpret.
    #[error("unexpected git output from {command}: {detail}")]
    UnexpectedOutput { command: String, detail: String },
}

/// Result of a push attempt that reached the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote accepted the update.
    Accepted,
    /// The remote refused because it moved past the observed tip.
    Rejected { reason: String },
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted)
    }
}

/// The git operations the publish flows need.
///
/// Implementations run single-threaded against one working tree; the
/// futures are not required to be `Send`.
#[allow(async_fn_in_trait)]
pub trait Vcs {
    /// Entries under `pathspec` that differ from the last commit, including
    /// untracked files.
    async fn changed_paths(&self, pathspec: &str) -> Result<Vec<StatusEntry>, GitError>;

    /// Stage everything matching the given pathspecs.
    async fn stage(&self, pathspecs: &[String]) -> Result<(), GitError>;

    /// Record one commit holding only the paths matching `pathspecs`.
    ///
    /// Anything else already staged in the index stays staged and out of
    /// the commit.
    async fn commit(&self, message: &str, pathspecs: &[String]) -> Result<(), GitError>;

    /// Fetch `branch` from `remote` and return the commit id it points at.
    async fn fetch(&self, remote: &str, branch: &str) -> Result<String, GitError>;

    /// Replay local commits on top of `upstream`.
    async fn rebase_onto(&self, upstream: &str) -> Result<(), GitError>;

    /// Push `HEAD` to `branch` on `remote`.
    ///
    /// With `expected_tip` set the push is a compare-and-swap: it is rejected
    /// unless the remote branch still points at that commit.
    async fn push(
        &self,
        remote: &str,
        branch: &str,
        expected_tip: Option<&str>,
    ) -> Result<PushOutcome, GitError>;
}
