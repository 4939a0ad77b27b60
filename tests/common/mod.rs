//! Scripted in-memory `Vcs` shared by the publish integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use postsync::git::{GitError, PushOutcome, StatusEntry, Vcs};

/// Every call the publish flows made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ChangedPaths(String),
    Stage(Vec<String>),
    Commit(Vec<String>),
    Fetch,
    Rebase(String),
    Push(Option<String>),
}

impl Op {
    pub fn mutates(&self) -> bool {
        !matches!(self, Op::ChangedPaths(_))
    }
}

#[derive(Default)]
struct State {
    ops: Vec<Op>,
    changed: Vec<StatusEntry>,
    pushes: VecDeque<PushOutcome>,
    fetches: u32,
    fail_stage: bool,
    fail_fetch: bool,
    conflict_on_rebase: bool,
    fail_push: bool,
}

#[derive(Default)]
pub struct ScriptedVcs {
    state: Mutex<State>,
}

pub fn rejected() -> PushOutcome {
    PushOutcome::Rejected {
        reason: "[rejected] (stale info)".to_string(),
    }
}

impl ScriptedVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report these paths as modified.
    pub fn with_changes(self, paths: &[&str]) -> Self {
        self.state.lock().unwrap().changed = paths
            .iter()
            .map(|p| StatusEntry {
                index: ' ',
                worktree: 'M',
                path: p.to_string(),
            })
            .collect();
        self
    }

    /// Outcomes for successive pushes. Once exhausted, pushes are accepted.
    pub fn with_pushes(self, outcomes: Vec<PushOutcome>) -> Self {
        self.state.lock().unwrap().pushes = outcomes.into();
        self
    }

    pub fn failing_stage(self) -> Self {
        self.state.lock().unwrap().fail_stage = true;
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    pub fn conflicting_rebase(self) -> Self {
        self.state.lock().unwrap().conflict_on_rebase = true;
        self
    }

    pub fn failing_push(self) -> Self {
        self.state.lock().unwrap().fail_push = true;
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops().iter().filter(|op| pred(op)).count()
    }

    pub fn commits(&self) -> usize {
        self.count(|op| matches!(op, Op::Commit(_)))
    }

    pub fn pushes(&self) -> usize {
        self.count(|op| matches!(op, Op::Push(_)))
    }

    fn record(&self, op: Op) {
        self.state.lock().unwrap().ops.push(op);
    }
}

fn failed(command: &str, stderr: &str) -> GitError {
    GitError::CommandFailed {
        command: command.to_string(),
        status: "exit status: 128".to_string(),
        stderr: stderr.to_string(),
    }
}

impl Vcs for ScriptedVcs {
    async fn changed_paths(&self, pathspec: &str) -> Result<Vec<StatusEntry>, GitError> {
        self.record(Op::ChangedPaths(pathspec.to_string()));
        Ok(self.state.lock().unwrap().changed.clone())
    }

    async fn stage(&self, pathspecs: &[String]) -> Result<(), GitError> {
        self.record(Op::Stage(pathspecs.to_vec()));
        if self.state.lock().unwrap().fail_stage {
            return Err(failed("add", "fatal: pathspec did not match any files"));
        }
        Ok(())
    }

    async fn commit(&self, _message: &str, pathspecs: &[String]) -> Result<(), GitError> {
        self.record(Op::Commit(pathspecs.to_vec()));
        Ok(())
    }

    async fn fetch(&self, _remote: &str, _branch: &str) -> Result<String, GitError> {
        self.record(Op::Fetch);
        let mut state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(failed("fetch", "fatal: Authentication failed"));
        }
        state.fetches += 1;
        Ok(format!("tip-{}", state.fetches))
    }

    async fn rebase_onto(&self, upstream: &str) -> Result<(), GitError> {
        self.record(Op::Rebase(upstream.to_string()));
        if self.state.lock().unwrap().conflict_on_rebase {
            return Err(GitError::RebaseConflict {
                upstream: upstream.to_string(),
                stderr: "CONFLICT (content)".to_string(),
            });
        }
        Ok(())
    }

    async fn push(
        &self,
        _remote: &str,
        _branch: &str,
        expected_tip: Option<&str>,
    ) -> Result<PushOutcome, GitError> {
        self.record(Op::Push(expected_tip.map(str::to_string)));
        let mut state = self.state.lock().unwrap();
        if state.fail_push {
            return Err(failed("push", "fatal: could not read Username"));
        }
        Ok(state.pushes.pop_front().unwrap_or(PushOutcome::Accepted))
    }
}
