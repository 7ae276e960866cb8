//! git::interface
//!
//! The real [`RefStore`]: a git2 repository for local reads and ref
//! writes, plus the `git` CLI for everything that touches the network or
//! the working tree.
//!
//! # Architecture
//!
//! `Git` is the only type in the crate that imports `git2`. The split
//! between the two backends is:
//!
//! | Operation | Backend |
//! |---|---|
//! | branch/tag enumeration, tips, ancestry, status, config | git2 |
//! | branch creation, CAS pointer moves | git2 |
//! | fetch, push, `ls-remote`, `remote prune` | git CLI |
//! | `merge --ff-only`, `add`/`commit`, `git lfs` | git CLI |
//!
//! The CLI inherits the user's credential helpers and SSH agent, so
//! transport and authentication need no handling here.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::RemoteUnreachable`]: fetch or ls-remote failed
//! - [`GitError::NotFastForward`]: `merge --ff-only` refused
//! - [`GitError::PushRejected`]: the remote refused a push
//!
//! # Example
//!
//! ```ignore
//! use refsync::git::{Git, RefStore};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?.with_remote("origin");
//! for branch in git.local_branches()? {
//!     println!("{branch}");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;
use tracing::debug;

use crate::core::types::{BranchName, Oid, RefName, TagName, TypeError};

use super::store::{
    CommitSummary, PushMode, RefStore, RejectReason, TagRef, Upstream, WorktreeStatus,
};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref moved between classification and the update.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// The remote could not be contacted.
    #[error("remote '{remote}' unreachable: {message}")]
    RemoteUnreachable {
        /// Remote name
        remote: String,
        /// git's error output
        message: String,
    },

    /// A fast-forward was refused; the branch needs a manual merge.
    #[error("cannot fast-forward {branch}: {message}")]
    NotFastForward {
        /// The branch being updated
        branch: String,
        /// git's error output
        message: String,
    },

    /// The remote refused a push.
    #[error("push of {target} rejected: {reason}")]
    PushRejected {
        /// Branch name, or `tags` for a tag batch
        target: String,
        /// Classified cause
        reason: RejectReason,
        /// git's error output
        message: String,
    },

    /// A branch to be created already exists.
    #[error("branch already exists: {branch}")]
    BranchExists {
        /// The existing branch
        branch: String,
    },

    /// A pointer move targeted the checked-out branch.
    #[error("branch {branch} is checked out")]
    BranchCheckedOut {
        /// The current branch
        branch: String,
    },

    /// A git subprocess failed or could not be started.
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// The command line
        command: String,
        /// stderr, or the spawn error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Exists => GitError::BranchExists {
                branch: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg)
            | TypeError::InvalidBranchName(msg)
            | TypeError::InvalidTagName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// A repository with a working directory, bound to one remote.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Working directory; CLI commands run here
    workdir: PathBuf,
    /// Remote for all network operations
    remote: String,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .field("remote", &self.remote)
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository. The remote starts as `origin`; see
    /// [`Git::with_remote`].
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let workdir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(Self {
            repo,
            workdir,
            remote: crate::core::config::DEFAULT_REMOTE.to_string(),
        })
    }

    /// Bind network operations to `remote`.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Root of the working tree.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The repository's preferred remote.
    ///
    /// Prefers `origin`, otherwise the first configured remote; `None` if
    /// there are no remotes.
    pub fn default_remote(&self) -> Result<Option<String>, GitError> {
        let remotes = self.repo.remotes()?;

        if remotes.iter().flatten().any(|name| name == "origin") {
            return Ok(Some("origin".to_string()));
        }

        Ok(remotes.iter().flatten().next().map(String::from))
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a string from the repository's merged config.
    fn config_string(&self, key: &str) -> Result<Option<String>, GitError> {
        let config = self.repo.config()?.snapshot()?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, key)),
        }
    }

    fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    // =========================================================================
    // CLI
    // =========================================================================

    /// Run `git <args>` in the working tree, capturing its output.
    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        debug!(command = %args.join(" "), "git");
        Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    /// Run `git <args>` and return stdout, failing on a non-zero exit.
    fn run_checked(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                message: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn unreachable(&self, output: &Output) -> GitError {
        GitError::RemoteUnreachable {
            remote: self.remote.clone(),
            message: stderr_of(output),
        }
    }
}

impl RefStore for Git {
    fn remote(&self) -> &str {
        &self.remote
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    fn unborn_branch(&self) -> Result<Option<BranchName>, GitError> {
        match self.repo.head() {
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {}
            Ok(_) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        match head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
        {
            Some(name) => Ok(Some(BranchName::new(name)?)),
            None => Ok(None),
        }
    }

    fn local_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            // Names git2 can't decode or we can't validate are skipped
            if let Some(name) = branch.name().ok().flatten() {
                if let Ok(branch_name) = BranchName::new(name) {
                    names.push(branch_name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let prefix = format!("refs/remotes/{}/", self.remote);
        let mut names = Vec::new();
        for reference in self.repo.references_glob(&format!("{prefix}*"))? {
            let reference = reference?;
            let Some(name) = reference.name().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if name == "HEAD" {
                continue;
            }
            if let Ok(branch_name) = BranchName::new(name) {
                names.push(branch_name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn tags(&self) -> Result<Vec<TagRef>, GitError> {
        let mut tags = Vec::new();
        for reference in self.repo.references_glob("refs/tags/*")? {
            let reference = reference?;
            let Some(name) = reference.name().and_then(|n| n.strip_prefix("refs/tags/")) else {
                continue;
            };
            let Ok(name) = TagName::new(name) else {
                continue;
            };
            // Tags of trees or blobs are not release markers
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            tags.push(TagRef {
                name,
                target: Oid::new(commit.id().to_string())?,
            });
        }
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    fn remote_tags(&self) -> Result<Vec<TagRef>, GitError> {
        let output = self.run(&["ls-remote", "--tags", &self.remote])?;
        if !output.status.success() {
            return Err(self.unreachable(&output));
        }
        Ok(parse_ls_remote_tags(&String::from_utf8_lossy(&output.stdout)))
    }

    fn upstream_of(&self, branch: &BranchName) -> Result<Option<Upstream>, GitError> {
        let Some(remote) = self.config_string(&format!("branch.{branch}.remote"))? else {
            return Ok(None);
        };
        let Some(merge) = self.config_string(&format!("branch.{branch}.merge"))? else {
            return Ok(None);
        };
        // "." tracks another local branch
        if remote == "." {
            return Ok(None);
        }
        let Some(name) = merge.strip_prefix("refs/heads/") else {
            return Ok(None);
        };
        Ok(Some(Upstream::new(remote, BranchName::new(name)?)))
    }

    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(RefName::for_branch(branch).as_str())
    }

    fn tracking_tip(&self, upstream: &Upstream) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(upstream.tracking_ref().as_str())
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        // A commit is its own ancestor
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = Self::to_git2_oid(ancestor)?;
        let descendant_oid = Self::to_git2_oid(descendant)?;

        Ok(self
            .repo
            .graph_descendant_of(descendant_oid, ancestor_oid)?)
    }

    fn ahead_count(&self, from: &Oid, to: &Oid) -> Result<usize, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(Self::to_git2_oid(to)?)?;
        revwalk.hide(Self::to_git2_oid(from)?)?;
        Ok(revwalk.count())
    }

    fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    fn latest_commit(&self) -> Result<Option<CommitSummary>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        Ok(Some(CommitSummary {
            oid: Oid::new(commit.id().to_string())?,
            summary: commit.summary().unwrap_or("").to_string(),
        }))
    }

    fn latest_tags(&self, limit: usize) -> Result<Vec<TagName>, GitError> {
        let stdout = self.run_checked(&["tag", "--sort=-creatordate"])?;
        Ok(stdout
            .lines()
            .filter_map(|line| TagName::new(line.trim()).ok())
            .take(limit)
            .collect())
    }

    fn identity(&self) -> Result<String, GitError> {
        if let Some(name) = self.config_string("user.name")? {
            if !name.trim().is_empty() {
                return Ok(name);
            }
        }
        Ok(std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string()))
    }

    fn stale_remote_refs(&self) -> Result<Vec<RefName>, GitError> {
        let output = self.run(&["remote", "prune", "--dry-run", &self.remote])?;
        if !output.status.success() {
            return Err(self.unreachable(&output));
        }
        Ok(parse_prune_output(
            &String::from_utf8_lossy(&output.stdout),
            "[would prune]",
        ))
    }

    fn lfs_missing_files(&self) -> Result<Option<Vec<String>>, GitError> {
        match self.run(&["lfs", "--version"]) {
            Ok(output) if output.status.success() => {}
            _ => return Ok(None),
        }

        let output = self.run(&["lfs", "ls-files", "-n"])?;
        if !output.status.success() {
            // LFS installed but not in use here
            return Ok(Some(Vec::new()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Some(
            stdout
                .lines()
                .map(str::trim)
                .filter(|path| !path.is_empty() && !self.workdir.join(path).exists())
                .map(String::from)
                .collect(),
        ))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn fetch(&self, prune: bool) -> Result<(), GitError> {
        let mut args = vec!["fetch", self.remote.as_str()];
        if prune {
            args.push("--prune");
        }
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(self.unreachable(&output));
        }
        Ok(())
    }

    fn fetch_tags(&self, prune: bool) -> Result<(), GitError> {
        // No --prune-tags: it would delete local tags that were never pushed
        let mut args = vec!["fetch", self.remote.as_str(), "--tags"];
        if prune {
            args.push("--prune");
        }
        self.run_checked(&args).map(|_| ())
    }

    fn create_tracking_branch(
        &self,
        name: &BranchName,
        upstream: &Upstream,
    ) -> Result<Oid, GitError> {
        let tracking_ref = upstream.tracking_ref();
        let tip = self.resolve_ref(tracking_ref.as_str())?;
        let commit = self
            .repo
            .find_commit(Self::to_git2_oid(&tip)?)
            .map_err(|e| GitError::from_git2(e, tip.as_str()))?;

        let mut branch = self
            .repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        branch
            .set_upstream(Some(upstream.to_string().as_str()))
            .map_err(|e| GitError::from_git2(e, tracking_ref.as_str()))?;

        debug!(branch = %name, upstream = %upstream, tip = %tip.short(7), "created tracking branch");
        Ok(tip)
    }

    fn fast_forward_current(&self) -> Result<Oid, GitError> {
        let branch = self
            .current_branch()?
            .map(|b| b.to_string())
            .unwrap_or_else(|| "HEAD".to_string());

        let output = self.run(&["merge", "--ff-only", "@{u}"])?;
        if !output.status.success() {
            return Err(GitError::NotFastForward {
                branch,
                message: stderr_of(&output),
            });
        }

        self.resolve_ref("HEAD")
    }

    fn move_branch_pointer(
        &self,
        name: &BranchName,
        target: &Oid,
        expected_old: &Oid,
    ) -> Result<(), GitError> {
        if self.current_branch()?.as_ref() == Some(name) {
            return Err(GitError::BranchCheckedOut {
                branch: name.to_string(),
            });
        }

        let refname = RefName::for_branch(name);
        let current = self.try_resolve_ref(refname.as_str())?;

        match current {
            Some(actual) if &actual == expected_old => {}
            other => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old.to_string(),
                    actual: other.map_or_else(|| "<none>".to_string(), |o| o.to_string()),
                });
            }
        }

        self.repo
            .reference_matching(
                refname.as_str(),
                Self::to_git2_oid(target)?,
                true,
                Self::to_git2_oid(expected_old)?,
                &format!("refsync: fast-forward to {}", target.short(7)),
            )
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        Ok(())
    }

    fn prune_remote_refs(&self) -> Result<Vec<RefName>, GitError> {
        let output = self.run(&["remote", "prune", &self.remote])?;
        if !output.status.success() {
            return Err(self.unreachable(&output));
        }
        Ok(parse_prune_output(
            &String::from_utf8_lossy(&output.stdout),
            "[pruned]",
        ))
    }

    fn commit_all(&self, message: &str) -> Result<Option<Oid>, GitError> {
        self.run_checked(&["add", "-A"])?;

        if self.worktree_status()?.staged == 0 {
            return Ok(None);
        }

        self.run_checked(&["commit", "-m", message])?;
        self.resolve_ref("HEAD").map(Some)
    }

    fn push_branch(&self, name: &BranchName, mode: PushMode) -> Result<(), GitError> {
        // An existing upstream on this remote may use a different name
        let dest = match self.upstream_of(name)? {
            Some(up) if up.remote == self.remote && !mode.set_upstream => up.branch,
            _ => name.clone(),
        };
        let refspec = format!("{}:{}", RefName::for_branch(name), RefName::for_branch(&dest));

        let mut args = vec!["push"];
        if mode.set_upstream {
            args.push("-u");
        }
        if mode.force_with_lease {
            args.push("--force-with-lease");
        }
        args.extend([self.remote.as_str(), refspec.as_str()]);

        let output = self.run(&args)?;
        if !output.status.success() {
            let message = stderr_of(&output);
            return Err(GitError::PushRejected {
                target: name.to_string(),
                reason: RejectReason::classify(&message),
                message,
            });
        }
        Ok(())
    }

    fn push_tags(&self, tags: &[TagName]) -> Result<(), GitError> {
        if tags.is_empty() {
            return Ok(());
        }

        let refspecs: Vec<String> = tags
            .iter()
            .map(|t| RefName::for_tag(t).to_string())
            .collect();
        let mut args = vec!["push", self.remote.as_str()];
        args.extend(refspecs.iter().map(String::as_str));

        let output = self.run(&args)?;
        if !output.status.success() {
            let message = stderr_of(&output);
            return Err(GitError::PushRejected {
                target: "tags".to_string(),
                reason: RejectReason::classify(&message),
                message,
            });
        }
        Ok(())
    }

    fn lfs_untrack(&self, paths: &[String]) -> Result<(), GitError> {
        for path in paths {
            self.run_checked(&["lfs", "untrack", path])?;
        }
        self.run_checked(&["add", ".gitattributes"])?;
        Ok(())
    }
    fn undo_last_commit(&self) -> Result<String, GitError> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        let message = head.message().unwrap_or("").to_string();
        let parent = head.parent(0).map_err(|_| GitError::Internal {
            message: format!("commit {} has no parent to reset to", head.id()),
        })?;

        self.repo
            .reset(parent.as_object(), git2::ResetType::Soft, None)
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        debug!(from = %head.id(), to = %parent.id(), "soft reset");
        Ok(message)
    }

    fn lfs_track(&self, path: &str) -> Result<(), GitError> {
        self.run_checked(&["lfs", "install", "--local"])?;
        self.run_checked(&["lfs", "track", path])?;
        // Drop the staged blob so the re-add goes through the LFS clean filter
        self.run_checked(&["rm", "--cached", "-q", "--", path])?;
        self.run_checked(&["add", "--", ".gitattributes", path])?;
        Ok(())
    }

    fn commit_staged(&self, message: &str) -> Result<Oid, GitError> {
        self.run_checked(&["commit", "-q", "-m", message])?;
        self.resolve_ref("HEAD")
    }
}

/// Trimmed stderr, or stdout when stderr is empty.
fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}

/// Parse `git ls-remote --tags` output.
///
/// Annotated tags appear twice; the peeled `^{}` line carries the commit
/// and wins over the tag object's id.
fn parse_ls_remote_tags(stdout: &str) -> Vec<TagRef> {
    let mut tags: Vec<TagRef> = Vec::new();

    for line in stdout.lines() {
        let Some((oid, refname)) = line.split_once('\t') else {
            continue;
        };
        let Some(name) = refname.trim().strip_prefix("refs/tags/") else {
            continue;
        };
        let (name, peeled) = match name.strip_suffix("^{}") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let (Ok(name), Ok(target)) = (TagName::new(name), Oid::new(oid.trim())) else {
            continue;
        };

        match tags.iter_mut().find(|t| t.name == name) {
            Some(existing) if peeled => existing.target = target,
            Some(_) => {}
            None => tags.push(TagRef { name, target }),
        }
    }

    tags.sort_by(|a, b| a.name.cmp(&b.name));
    tags
}

/// Parse `git remote prune [--dry-run]` output lines such as
/// ` * [pruned] origin/feature`.
fn parse_prune_output(stdout: &str, marker: &str) -> Vec<RefName> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix('*'))
        .filter_map(|rest| rest.trim().strip_prefix(marker))
        .filter_map(|short| RefName::new(format!("refs/remotes/{}", short.trim())).ok())
        .collect()
}
