//! Git-backed revision resolution and checkouts
//!
//! Checkouts are plain clones of the project repository, kept under the
//! project state directory and keyed by commit id. Re-materializing a
//! commit fetches into the existing clone instead of cloning again.

use crate::context::BuildContext;
use crate::error::{RelentlessError, RelentlessResult};
use crate::revision::BuildContextResolver;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Length of the commit id prefix naming a checkout directory
const CHECKOUT_ID_LEN: usize = 12;

/// Branch listed first when listing every branch
const PRIMARY_BRANCH: &str = "master";

/// Ref namespace holding the source repository's remote-tracking branches
/// inside a checkout
const SOURCE_REMOTES: &str = "refs/remotes/source";

/// One commit of the project history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub committed: DateTime<Utc>,
    pub summary: String,
}

/// Commits reachable from a set of branches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitHistory {
    /// Branches in listing order
    pub branches: Vec<String>,
    /// Commit ids per branch, oldest first
    pub by_branch: BTreeMap<String, Vec<String>>,
    /// Union of every branch's commits, oldest first
    pub commits: Vec<Commit>,
}

/// Resolves and checks out revisions of a local git repository
#[derive(Debug, Clone)]
pub struct GitResolver {
    repo: PathBuf,
    checkouts: PathBuf,
}

impl GitResolver {
    /// Resolver for `repo`, materializing checkouts under `checkouts`
    pub fn new(repo: impl Into<PathBuf>, checkouts: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            checkouts: checkouts.into(),
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn checkouts(&self) -> &Path {
        &self.checkouts
    }

    /// Directory a revision is materialized in
    pub fn checkout_dir(&self, revision: &str) -> PathBuf {
        let end = revision
            .char_indices()
            .nth(CHECKOUT_ID_LEN)
            .map(|(i, _)| i)
            .unwrap_or(revision.len());
        self.checkouts.join(&revision[..end])
    }

    /// Execute a git command in `dir` and return the output
    async fn exec(&self, dir: &Path, args: &[&str]) -> RelentlessResult<Output> {
        debug!("Executing: git {:?} in {}", args, dir.display());

        Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RelentlessError::command_failed(format!("git {:?}", args), e))
    }

    /// Execute a git command that must succeed, returning its stdout
    async fn git(&self, dir: &Path, args: &[&str]) -> RelentlessResult<String> {
        let output = self.exec(dir, args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(RelentlessError::git(
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    /// Commit id `spec` names in the project repository, if any
    async fn rev_parse(&self, spec: &str) -> RelentlessResult<Option<String>> {
        let commit = format!("{}^{{commit}}", spec);
        let output = self
            .exec(&self.repo, &["rev-parse", "--verify", "--quiet", &commit])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    /// Local branches, `master` first when present
    pub async fn branches(&self) -> RelentlessResult<Vec<String>> {
        let stdout = self
            .git(
                &self.repo,
                &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
            )
            .await?;

        let mut branches: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(pos) = branches.iter().position(|b| b == PRIMARY_BRANCH) {
            let primary = branches.remove(pos);
            branches.insert(0, primary);
        }
        Ok(branches)
    }

    /// Commits of `branches` (every local branch when `None`), oldest first
    pub async fn list_commits(&self, branches: Option<&[String]>) -> RelentlessResult<CommitHistory> {
        let branches = match branches {
            Some(branches) => branches.to_vec(),
            None => self.branches().await?,
        };

        let mut history = CommitHistory {
            branches: branches.clone(),
            ..CommitHistory::default()
        };
        let mut seen = HashSet::new();

        for branch in &branches {
            let stdout = self
                .git(
                    &self.repo,
                    &["log", "--reverse", "--format=%H%x09%ct%x09%s", branch, "--"],
                )
                .await?;

            let mut ids = Vec::new();
            for line in stdout.lines() {
                let mut parts = line.splitn(3, '\t');
                let (Some(id), Some(timestamp)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let summary = parts.next().unwrap_or_default();
                ids.push(id.to_string());

                if seen.insert(id.to_string()) {
                    let committed = timestamp
                        .parse::<i64>()
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                        .unwrap_or_default();
                    history.commits.push(Commit {
                        id: id.to_string(),
                        committed,
                        summary: summary.to_string(),
                    });
                }
            }
            history.by_branch.insert(branch.clone(), ids);
        }

        history.commits.sort_by_key(|commit| commit.committed);
        Ok(history)
    }

    /// Remove every materialized checkout
    pub async fn cleanup(&self) -> RelentlessResult<()> {
        if !self.checkouts.exists() {
            return Ok(());
        }
        info!("Removing checkouts in {}", self.checkouts.display());
        tokio::fs::remove_dir_all(&self.checkouts).await.map_err(|e| {
            RelentlessError::io(format!("removing checkouts {}", self.checkouts.display()), e)
        })
    }

    /// Bring the clone in `dir` up to date with the project repository
    async fn fetch(&self, dir: &Path) -> RelentlessResult<()> {
        let source_remotes = format!("+refs/remotes/*:{}/*", SOURCE_REMOTES);
        self.git(
            dir,
            &[
                "fetch",
                "--quiet",
                "origin",
                "+refs/heads/*:refs/remotes/origin/*",
                &source_remotes,
            ],
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl BuildContextResolver for GitResolver {
    /// Resolve a branch, tag or commit, falling back to `origin/<reference>`
    async fn resolve(&self, reference: &str) -> RelentlessResult<String> {
        if let Some(id) = self.rev_parse(reference).await? {
            debug!("Resolved {} to {}", reference, id);
            return Ok(id);
        }

        let remote = format!("origin/{}", reference);
        if let Some(id) = self.rev_parse(&remote).await? {
            debug!("Resolved {} to {} via {}", reference, id, remote);
            return Ok(id);
        }

        Err(RelentlessError::UnknownRevision {
            reference: reference.to_string(),
        })
    }

    async fn materialize(&self, revision: &str) -> RelentlessResult<BuildContext> {
        let dir = self.checkout_dir(revision);

        if dir.join(".git").exists() {
            debug!("Reusing checkout {}", dir.display());
        } else {
            info!("Cloning {} into {}", self.repo.display(), dir.display());
            tokio::fs::create_dir_all(&self.checkouts).await.map_err(|e| {
                RelentlessError::io(format!("creating checkouts {}", self.checkouts.display()), e)
            })?;
            let repo = self.repo.to_string_lossy();
            let target = dir.to_string_lossy();
            self.git(
                &self.checkouts,
                &["clone", "--quiet", "--no-checkout", &repo, &target],
            )
            .await?;
        }

        self.fetch(&dir).await?;
        self.git(&dir, &["checkout", "--quiet", "--force", "--detach", revision])
            .await?;

        Ok(BuildContext::new(dir)
            .with_src_dir(&self.repo)
            .with_revision(revision))
    }
}
