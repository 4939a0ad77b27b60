//! [`Vcs`] backed by the system `git` binary via [`tokio::process::Command`].
//!
//! Every call runs `git -C <repo>` with terminal prompts disabled so a
//! missing credential fails fast instead of hanging a scheduled job.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::status::{parse_porcelain_z, StatusEntry};
use super::{GitError, PushOutcome, Vcs};

/// Shells out to `git` inside one working tree.
#[derive(Debug, Clone)]
pub struct CommandGit {
    repo: PathBuf,
    identity: Option<(String, String)>,
}

impl CommandGit {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            identity: None,
        }
    }

    /// Commit as `name <email>` instead of the repository's configured user.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo);
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c").arg(format!("user.name={name}"));
            cmd.arg("-c").arg(format!("user.email={email}"));
        }
        cmd.args(args);

        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Run git and return its output regardless of exit status.
    async fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        let name = subcommand(args);
        debug!(command = %name, "spawning git");
        self.command(args)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: name,
                source,
            })
    }

    /// Run git and fail on a non-zero exit status.
    async fn run_checked(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(output)
    }
}

fn subcommand(args: &[&str]) -> String {
    args.first().copied().unwrap_or("").to_string()
}

fn command_failed(args: &[&str], output: &Output) -> GitError {
    let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if message.is_empty() {
        message = String::from_utf8_lossy(&output.stdout).trim().to_string();
    }
    GitError::CommandFailed {
        command: subcommand(args),
        status: output.status.to_string(),
        stderr: message,
    }
}

impl Vcs for CommandGit {
    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn changed_paths(&self, pathspec: &str) -> Result<Vec<StatusEntry>, GitError> {
        let output = self
            .run_checked(&[
                "status",
                "--porcelain=v1",
                "-z",
                "--untracked-files=all",
                "--",
                pathspec,
            ])
            .await?;
        let entries = parse_porcelain_z(&String::from_utf8_lossy(&output.stdout));
        debug!(changed = entries.len(), "git status complete");
        Ok(entries)
    }

    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn stage(&self, pathspecs: &[String]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(pathspecs.iter().map(String::as_str));
        self.run_checked(&args).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn commit(&self, message: &str, pathspecs: &[String]) -> Result<(), GitError> {
        let mut args = vec!["commit", "--quiet", "--only", "-m", message, "--"];
        args.extend(pathspecs.iter().map(String::as_str));
        self.run_checked(&args).await?;
        debug!("git commit succeeded");
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn fetch(&self, remote: &str, branch: &str) -> Result<String, GitError> {
        self.run_checked(&["fetch", "--no-tags", remote, branch])
            .await?;

        let output = self
            .run_checked(&["rev-parse", "--verify", "FETCH_HEAD^{commit}"])
            .await?;
        let tip = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if tip.is_empty() {
            return Err(GitError::UnexpectedOutput {
                command: "rev-parse".to_string(),
                detail: "FETCH_HEAD resolved to nothing".to_string(),
            });
        }

        debug!(%tip, "git fetch complete");
        Ok(tip)
    }

    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn rebase_onto(&self, upstream: &str) -> Result<(), GitError> {
        let args = ["rebase", "--autostash", upstream];
        let output = self.run(&args).await?;
        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let conflicted = is_rebase_conflict(&stdout, &stderr);

        // Leave the working tree as it was before the attempt.
        match self.run(&["rebase", "--abort"]).await {
            Ok(abort) if !abort.status.success() => {
                debug!("git rebase --abort had nothing to abort");
            }
            Err(e) => warn!(error = %e, "failed to abort rebase"),
            Ok(_) => {}
        }

        if conflicted {
            return Err(GitError::RebaseConflict {
                upstream: upstream.to_string(),
                stderr: format!("{}\n{}", stdout.trim(), stderr.trim())
                    .trim()
                    .to_string(),
            });
        }
        Err(command_failed(&args, &output))
    }

    #[instrument(skip(self), fields(repo = %self.repo.display()))]
    async fn push(
        &self,
        remote: &str,
        branch: &str,
        expected_tip: Option<&str>,
    ) -> Result<PushOutcome, GitError> {
        let target = format!("HEAD:refs/heads/{branch}");
        let lease = expected_tip.map(|tip| format!("--force-with-lease=refs/heads/{branch}:{tip}"));

        let mut args = vec!["push", "--porcelain"];
        if let Some(lease) = &lease {
            args.push(lease);
        }
        args.push(remote);
        args.push(&target);

        let output = self.run(&args).await?;
        if output.status.success() {
            debug!("git push accepted");
            return Ok(PushOutcome::Accepted);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match push_rejection_reason(&stdout, &stderr) {
            Some(reason) => {
                debug!(%reason, "git push rejected by remote");
                Ok(PushOutcome::Rejected { reason })
            }
            None => Err(command_failed(&args, &output)),
        }
    }
}

fn is_rebase_conflict(stdout: &str, stderr: &str) -> bool {
    [stdout, stderr]
        .iter()
        .any(|s| s.contains("CONFLICT") || s.contains("could not apply"))
}

/// Decide whether a failed push was refused because the remote moved.
///
/// Uses the `--porcelain` status lines (`!\t<ref>\t[rejected] (...)`) when
/// present and falls back to git's human-readable hints. Server-side refusals
/// (`[remote rejected]`, e.g. branch protection) are not contention and
/// return `None`.
pub(crate) fn push_rejection_reason(stdout: &str, stderr: &str) -> Option<String> {
    for line in stdout.lines() {
        if !line.starts_with('!') {
            continue;
        }
        if let Some(idx) = line.find("[rejected]") {
            return Some(line[idx..].trim().to_string());
        }
    }

    ["stale info", "fetch first", "non-fast-forward"]
        .into_iter()
        .find(|hint| stderr.contains(hint))
        .map(|hint| format!("[rejected] ({hint})"))
}
