//! git::store
//!
//! The `RefStore` contract: every repository query and mutation the
//! reconciler and publisher need.
//!
//! # Design
//!
//! The engine never touches the repository directly. It sees branches,
//! tags and the commit graph only through this trait, which has two
//! implementations:
//!
//! - [`crate::git::Git`] - the real repository (git2 + git CLI)
//! - [`crate::git::mock::MockRefStore`] - in-memory fake for tests
//!
//! Methods are grouped as queries (no side effects) and mutations. Network
//! access happens only in `fetch`, `fetch_tags`, `remote_tags`,
//! `push_branch` and `push_tags`.

use serde::Serialize;

use crate::core::types::{BranchName, Oid, RefName, TagName};

use super::interface::GitError;

/// The remote branch a local branch is configured to track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upstream {
    /// Remote name (`origin`)
    pub remote: String,
    /// Branch name on that remote
    pub branch: BranchName,
}

impl Upstream {
    /// Create an upstream reference.
    pub fn new(remote: impl Into<String>, branch: BranchName) -> Self {
        Self {
            remote: remote.into(),
            branch,
        }
    }

    /// The remote-tracking ref holding the last fetched tip.
    pub fn tracking_ref(&self) -> RefName {
        RefName::for_remote_branch(&self.remote, &self.branch)
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// A tag and the commit it points to (peeled through annotated tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub name: TagName,
    pub target: Oid,
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// No staged or unstaged changes to tracked files.
    ///
    /// Untracked files do not count.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Anything at all that a commit of the whole tree would pick up.
    pub fn has_changes(&self) -> bool {
        !self.is_clean() || self.untracked > 0
    }
}

/// The newest commit on HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub oid: Oid,
    pub summary: String,
}

impl std::fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.oid.short(7), self.summary)
    }
}

/// How a branch push is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushMode {
    /// `-u`: record the pushed branch as upstream
    pub set_upstream: bool,
    /// `--force-with-lease`
    pub force_with_lease: bool,
}

impl PushMode {
    /// Plain push to an existing upstream.
    pub fn normal() -> Self {
        Self::default()
    }

    /// First push of a branch, establishing its upstream.
    pub fn set_upstream() -> Self {
        Self {
            set_upstream: true,
            force_with_lease: false,
        }
    }

    /// Guarded forced push.
    pub fn force_with_lease(set_upstream: bool) -> Self {
        Self {
            set_upstream,
            force_with_lease: true,
        }
    }
}

/// Why the remote refused a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RejectReason {
    /// The remote has commits the local branch does not.
    NonFastForward,
    /// `--force-with-lease` found the remote ref moved.
    StaleLease,
    /// A file exceeds the host's size limit.
    LargeFile { path: Option<String> },
    /// Authentication or authorization failure.
    Permission,
    /// The remote could not be reached.
    Network,
    /// Anything else; carries git's first error line.
    Other { message: String },
}

impl RejectReason {
    /// Classify a failed `git push` from its stderr.
    ///
    /// ```
    /// use refsync::git::RejectReason;
    ///
    /// let stderr = " ! [rejected]        main -> main (fetch first)";
    /// assert_eq!(RejectReason::classify(stderr), RejectReason::NonFastForward);
    /// ```
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_ascii_lowercase();

        if lower.contains("stale info") {
            return RejectReason::StaleLease;
        }
        if lower.contains("file is too large")
            || lower.contains("size exceeds")
            || lower.contains("exceeds github's file size limit")
            || lower.contains("large files detected")
        {
            return RejectReason::LargeFile {
                path: large_file_path(stderr),
            };
        }
        if lower.contains("non-fast-forward")
            || lower.contains("fetch first")
            || lower.contains("[rejected]")
        {
            return RejectReason::NonFastForward;
        }
        if lower.contains("permission denied")
            || lower.contains("permission to")
            || lower.contains("authentication failed")
            || lower.contains("403")
            || lower.contains("could not read username")
        {
            return RejectReason::Permission;
        }
        if lower.contains("could not resolve host")
            || lower.contains("unable to access")
            || lower.contains("connection refused")
            || lower.contains("timed out")
            || lower.contains("could not read from remote repository")
            || lower.contains("does not appear to be a git repository")
        {
            return RejectReason::Network;
        }

        let message = stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("push failed")
            .to_string();
        RejectReason::Other { message }
    }
}

/// Pull the offending path out of a host's large-file rejection.
///
/// Recognizes `File is too large: <path>;` and
/// `remote: error: File <path> is 123.00 MB; ...`.
fn large_file_path(stderr: &str) -> Option<String> {
    for line in stderr.lines() {
        if let Some(rest) = line.split("File is too large:").nth(1) {
            let path = rest.split(';').next().unwrap_or("").trim();
            if !path.is_empty() {
                return Some(path.to_string());
            }
        }
        if let Some(rest) = line.split("error: File ").nth(1) {
            if let Some((path, _)) = rest.split_once(" is ") {
                let path = path.trim();
                if !path.is_empty() {
                    return Some(path.to_string());
                }
            }
        }
    }
    None
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NonFastForward => {
                write!(f, "remote has commits not present locally (non-fast-forward)")
            }
            RejectReason::StaleLease => write!(f, "remote ref moved since last fetch (stale lease)"),
            RejectReason::LargeFile { path: Some(path) } => {
                write!(f, "file too large for the remote: {path}")
            }
            RejectReason::LargeFile { path: None } => write!(f, "a file is too large for the remote"),
            RejectReason::Permission => write!(f, "permission denied by the remote"),
            RejectReason::Network => write!(f, "remote unreachable"),
            RejectReason::Other { message } => write!(f, "{message}"),
        }
    }
}

/// Repository operations used by the reconciler and the publisher.
pub trait RefStore {
    /// Name of the remote all network operations target.
    fn remote(&self) -> &str;

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Current branch, or `None` on a detached or unborn HEAD.
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// The branch HEAD names while it has no commits yet, as in a fresh
    /// repository. `None` once the branch has a commit, or on a detached HEAD.
    fn unborn_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// All local branches, sorted by name.
    fn local_branches(&self) -> Result<Vec<BranchName>, GitError>;

    /// Branches known on the remote, from the remote-tracking refs, sorted.
    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError>;

    /// Local tags, sorted by name.
    fn tags(&self) -> Result<Vec<TagRef>, GitError>;

    /// Tags on the remote. Network.
    fn remote_tags(&self) -> Result<Vec<TagRef>, GitError>;

    /// Configured upstream of a local branch, if any.
    fn upstream_of(&self, branch: &BranchName) -> Result<Option<Upstream>, GitError>;

    /// Tip of a local branch.
    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError>;

    /// Tip of the remote-tracking ref for an upstream.
    fn tracking_tip(&self, upstream: &Upstream) -> Result<Option<Oid>, GitError>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError>;

    /// Number of commits reachable from `to` and not from `from`.
    fn ahead_count(&self, from: &Oid, to: &Oid) -> Result<usize, GitError>;

    /// Working tree and index status, untracked files included.
    fn worktree_status(&self) -> Result<WorktreeStatus, GitError>;

    /// Newest commit on HEAD, `None` in an empty repository.
    fn latest_commit(&self) -> Result<Option<CommitSummary>, GitError>;

    /// Most recently created tags, newest first.
    fn latest_tags(&self, limit: usize) -> Result<Vec<TagName>, GitError>;

    /// Committer name for generated commit messages.
    fn identity(&self) -> Result<String, GitError>;

    /// Remote-tracking refs whose branch no longer exists on the remote.
    fn stale_remote_refs(&self) -> Result<Vec<RefName>, GitError>;

    /// LFS-tracked paths missing from the working tree.
    ///
    /// `None` when Git LFS is not installed.
    fn lfs_missing_files(&self) -> Result<Option<Vec<String>>, GitError>;

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Fetch branches from the remote, optionally pruning deleted ones.
    fn fetch(&self, prune: bool) -> Result<(), GitError>;

    /// Fetch all tags from the remote.
    ///
    /// Never deletes a local tag. `prune` only drops remote-tracking
    /// branches deleted on the remote.
    fn fetch_tags(&self, prune: bool) -> Result<(), GitError>;

    /// Create `name` at the upstream's tip, tracking it. Returns the tip.
    fn create_tracking_branch(
        &self,
        name: &BranchName,
        upstream: &Upstream,
    ) -> Result<Oid, GitError>;

    /// Fast-forward the checked-out branch to its upstream. Returns the new tip.
    fn fast_forward_current(&self) -> Result<Oid, GitError>;

    /// Move a branch that is not checked out, if it still points at `expected_old`.
    fn move_branch_pointer(
        &self,
        name: &BranchName,
        target: &Oid,
        expected_old: &Oid,
    ) -> Result<(), GitError>;

    /// Delete stale remote-tracking refs. Returns what was removed.
    fn prune_remote_refs(&self) -> Result<Vec<RefName>, GitError>;

    /// Stage everything and commit. `None` if there was nothing to commit.
    fn commit_all(&self, message: &str) -> Result<Option<Oid>, GitError>;

    /// Push one branch to the remote.
    fn push_branch(&self, name: &BranchName, mode: PushMode) -> Result<(), GitError>;

    /// Push a batch of tags in one operation.
    fn push_tags(&self, tags: &[TagName]) -> Result<(), GitError>;

    /// Stop LFS-tracking the given paths and stage `.gitattributes`.
    fn lfs_untrack(&self, paths: &[String]) -> Result<(), GitError>;

    /// Undo the last commit of the current branch, keeping its changes
    /// staged. Returns the commit's full message.
    fn undo_last_commit(&self) -> Result<String, GitError>;

    /// Track `path` with Git LFS and restage it (and `.gitattributes`)
    /// through the LFS filter.
    fn lfs_track(&self, path: &str) -> Result<(), GitError>;

    /// Commit what is staged, as is.
    fn commit_staged(&self, message: &str) -> Result<Oid, GitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod worktree_status {
        use super::*;

        #[test]
        fn default_is_clean() {
            let status = WorktreeStatus::default();
            assert!(status.is_clean());
            assert!(!status.has_changes());
        }

        #[test]
        fn untracked_is_clean_but_has_changes() {
            let status = WorktreeStatus {
                untracked: 2,
                ..Default::default()
            };
            assert!(status.is_clean());
            assert!(status.has_changes());
        }

        #[test]
        fn conflicts_make_dirty() {
            let status = WorktreeStatus {
                has_conflicts: true,
                ..Default::default()
            };
            assert!(!status.is_clean());
        }
    }

    mod upstream {
        use super::*;

        #[test]
        fn tracking_ref_and_display() {
            let up = Upstream::new("origin", BranchName::new("feature/x").unwrap());
            assert_eq!(up.tracking_ref().as_str(), "refs/remotes/origin/feature/x");
            assert_eq!(up.to_string(), "origin/feature/x");
        }
    }

    mod reject_reason {
        use super::*;

        #[test]
        fn non_fast_forward() {
            let stderr = "To github.com:o/r.git\n ! [rejected]        main -> main (non-fast-forward)\nerror: failed to push some refs";
            assert_eq!(RejectReason::classify(stderr), RejectReason::NonFastForward);
        }

        #[test]
        fn stale_lease_wins_over_rejected() {
            let stderr = " ! [rejected]        main -> main (stale info)";
            assert_eq!(RejectReason::classify(stderr), RejectReason::StaleLease);
        }

        #[test]
        fn large_file_with_path() {
            let stderr = "remote: error: File assets/video.mp4 is 120.00 MB; this exceeds GitHub's file size limit of 100.00 MB";
            assert_eq!(
                RejectReason::classify(stderr),
                RejectReason::LargeFile {
                    path: Some("assets/video.mp4".into())
                }
            );
        }

        #[test]
        fn large_file_gitlab_style() {
            let stderr = "remote: File is too large: data/dump.sql; limit is 50 MB";
            assert_eq!(
                RejectReason::classify(stderr),
                RejectReason::LargeFile {
                    path: Some("data/dump.sql".into())
                }
            );
        }

        #[test]
        fn permission_before_network() {
            let stderr = "git@github.com: Permission denied (publickey).\nfatal: Could not read from remote repository.";
            assert_eq!(RejectReason::classify(stderr), RejectReason::Permission);
        }

        #[test]
        fn network() {
            let stderr = "fatal: unable to access 'https://example.com/r.git/': Could not resolve host: example.com";
            assert_eq!(RejectReason::classify(stderr), RejectReason::Network);
        }

        #[test]
        fn other_keeps_first_line() {
            let stderr = "\n  error: something odd\nmore";
            assert_eq!(
                RejectReason::classify(stderr),
                RejectReason::Other {
                    message: "error: something odd".into()
                }
            );
        }

        #[test]
        fn display_names_the_cause() {
            assert!(RejectReason::NonFastForward
                .to_string()
                .contains("non-fast-forward"));
            assert!(RejectReason::LargeFile {
                path: Some("a.bin".into())
            }
            .to_string()
            .contains("a.bin"));
        }
    }
}
