//! engine::report
//!
//! Results of a sync or push run.
//!
//! Reports accumulate every recoverable failure (branch update failures,
//! push rejections, tag conflicts, failed side steps) so they can be shown
//! once at the end. Only the fatal kinds in [`super::EngineError`] abort a
//! run. Reports serialize to JSON for `--json`.

use serde::Serialize;

use crate::core::types::{BranchName, Oid, RefName, TagName};
use crate::git::{CommitSummary, RejectReason, Upstream};

use super::delta::TreeState;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// All steps ran (individual refs may still have failed).
    Completed,
    /// The user declined a confirmation; nothing was changed.
    Aborted,
}

/// A side step that failed without stopping the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub step: String,
    pub message: String,
}

impl StepError {
    pub fn new(step: &str, err: impl std::fmt::Display) -> Self {
        Self {
            step: step.to_string(),
            message: err.to_string(),
        }
    }
}

/// A local tag whose remote counterpart points elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagConflict {
    pub tag: TagName,
    pub local: Oid,
    pub remote: Oid,
}

// =============================================================================
// Sync
// =============================================================================

/// A local tracking branch created for a new remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedBranch {
    pub branch: BranchName,
    pub upstream: Upstream,
    pub tip: Oid,
}

/// A branch that could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationFailure {
    pub branch: BranchName,
    pub message: String,
}

/// A branch moved forward to its upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchUpdate {
    pub branch: BranchName,
    pub from: Oid,
    pub to: Oid,
    /// Updated through the working tree (`merge --ff-only`).
    pub current: bool,
}

/// Why a branch was left where it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UpdateFailureReason {
    /// Both sides have commits the other lacks.
    Diverged { ahead: usize, behind: usize },
    /// Only the local side has new commits.
    Unpushed { ahead: usize },
    /// `merge --ff-only` on the current branch was refused.
    NeedsManualMerge { message: String },
    /// The update itself failed (ref moved, I/O error).
    Failed { message: String },
}

impl std::fmt::Display for UpdateFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateFailureReason::Diverged { ahead, behind } => write!(
                f,
                "diverged from upstream ({ahead} ahead, {behind} behind); merge or rebase manually"
            ),
            UpdateFailureReason::Unpushed { ahead } => {
                write!(f, "has {ahead} unpushed commit(s)")
            }
            UpdateFailureReason::NeedsManualMerge { message } => {
                write!(f, "cannot fast-forward, needs a manual merge: {message}")
            }
            UpdateFailureReason::Failed { message } => write!(f, "{message}"),
        }
    }
}

/// A branch that was not updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchUpdateFailure {
    pub branch: BranchName,
    pub reason: UpdateFailureReason,
}

/// Repository overview printed at the end of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    pub current_branch: Option<BranchName>,
    pub local_branches: usize,
    pub remote_branches: usize,
    pub tags: usize,
    pub latest_commit: Option<CommitSummary>,
}

/// Everything a sync did or could not do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: Outcome,
    pub remote: String,
    /// Paths untracked from LFS because they no longer exist.
    pub lfs_untracked: Vec<String>,
    /// Remote branches with no local counterpart.
    pub new_remote_branches: Vec<BranchName>,
    /// The user declined creating them.
    pub creation_declined: bool,
    pub created: Vec<CreatedBranch>,
    pub creation_failures: Vec<CreationFailure>,
    pub updated: Vec<BranchUpdate>,
    pub in_sync: Vec<BranchName>,
    pub local_only: Vec<BranchName>,
    pub update_failures: Vec<BranchUpdateFailure>,
    pub tag_conflicts: Vec<TagConflict>,
    pub new_tags: Vec<TagName>,
    /// Local tags the remote does not have. Kept; `push` publishes them.
    pub unpublished_tags: Vec<TagName>,
    /// Newest tags, listed when new tags arrived.
    pub latest_tags: Vec<TagName>,
    pub pruned: Vec<RefName>,
    pub step_errors: Vec<StepError>,
    pub summary: Option<RepoSummary>,
    pub elapsed_ms: u64,
}

impl SyncReport {
    pub fn new(remote: &str) -> Self {
        Self {
            outcome: Outcome::Completed,
            remote: remote.to_string(),
            lfs_untracked: Vec::new(),
            new_remote_branches: Vec::new(),
            creation_declined: false,
            created: Vec::new(),
            creation_failures: Vec::new(),
            updated: Vec::new(),
            in_sync: Vec::new(),
            local_only: Vec::new(),
            update_failures: Vec::new(),
            tag_conflicts: Vec::new(),
            new_tags: Vec::new(),
            unpublished_tags: Vec::new(),
            latest_tags: Vec::new(),
            pruned: Vec::new(),
            step_errors: Vec::new(),
            summary: None,
            elapsed_ms: 0,
        }
    }

    /// Whether any ref-level or step-level failure was recorded.
    pub fn has_failures(&self) -> bool {
        !self.creation_failures.is_empty()
            || !self.update_failures.is_empty()
            || !self.tag_conflicts.is_empty()
            || !self.step_errors.is_empty()
    }

    /// Nothing was created, moved, fetched or pruned.
    pub fn is_noop(&self) -> bool {
        self.new_remote_branches.is_empty()
            && self.created.is_empty()
            && self.updated.is_empty()
            && self.new_tags.is_empty()
            && self.pruned.is_empty()
            && self.lfs_untracked.is_empty()
    }
}

// =============================================================================
// Push
// =============================================================================

/// The auto-commit of a `--default` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoCommit {
    pub message: String,
    /// Set once the commit was made; `None` while planned or if there
    /// was nothing to commit.
    pub oid: Option<Oid>,
}

/// A branch selected for pushing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushCandidate {
    pub branch: BranchName,
    /// Commits ahead of the upstream; `None` for a first push.
    pub ahead: Option<usize>,
    /// Push with `-u`.
    pub set_upstream: bool,
}

/// A push the remote refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRejection {
    /// Branch name, or `tags` for the tag batch
    pub target: String,
    pub reason: RejectReason,
    pub hint: Option<String>,
}

/// A last commit rewritten to move a too-large file into Git LFS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LfsRewrite {
    pub branch: BranchName,
    pub path: String,
    /// The replacement commit.
    pub commit: Oid,
}

/// Everything a push did or could not do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub outcome: Outcome,
    pub remote: String,
    pub tree_state: Option<TreeState>,
    pub auto_commit: Option<AutoCommit>,
    pub candidates: Vec<PushCandidate>,
    /// Branches with a remote counterpart at or ahead of them.
    pub up_to_date: Vec<BranchName>,
    pub tag_candidates: Vec<TagName>,
    pub tag_conflicts: Vec<TagConflict>,
    /// Force-with-lease push of the current branch.
    pub forced: bool,
    pub pushed: Vec<BranchName>,
    pub tags_pushed: Vec<TagName>,
    pub rejections: Vec<PushRejection>,
    pub lfs_rewrites: Vec<LfsRewrite>,
    pub warnings: Vec<String>,
}

impl PushReport {
    pub fn new(remote: &str) -> Self {
        Self {
            outcome: Outcome::Completed,
            remote: remote.to_string(),
            tree_state: None,
            auto_commit: None,
            candidates: Vec::new(),
            up_to_date: Vec::new(),
            tag_candidates: Vec::new(),
            tag_conflicts: Vec::new(),
            forced: false,
            pushed: Vec::new(),
            tags_pushed: Vec::new(),
            rejections: Vec::new(),
            lfs_rewrites: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Nothing to commit or push.
    pub fn nothing_to_do(&self) -> bool {
        self.candidates.is_empty() && self.tag_candidates.is_empty() && self.auto_commit.is_none()
    }

    /// Whether any ref-level failure was recorded.
    pub fn has_failures(&self) -> bool {
        !self.rejections.is_empty() || !self.tag_conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn fresh_sync_report_is_noop() {
        let report = SyncReport::new("origin");
        assert!(report.is_noop());
        assert!(!report.has_failures());
        assert_eq!(report.outcome, Outcome::Completed);
    }

    #[test]
    fn failures_are_detected() {
        let mut report = SyncReport::new("origin");
        report.update_failures.push(BranchUpdateFailure {
            branch: BranchName::new("dev").unwrap(),
            reason: UpdateFailureReason::Unpushed { ahead: 2 },
        });
        assert!(report.has_failures());
        assert!(report.is_noop());
    }

    #[test]
    fn reason_display_names_counts() {
        let text = UpdateFailureReason::Diverged {
            ahead: 2,
            behind: 3,
        }
        .to_string();
        assert!(text.contains("2 ahead"));
        assert!(text.contains("3 behind"));
        assert!(UpdateFailureReason::Unpushed { ahead: 1 }
            .to_string()
            .contains("unpushed"));
    }

    #[test]
    fn push_report_json_shape() {
        let mut report = PushReport::new("origin");
        report.candidates.push(PushCandidate {
            branch: BranchName::new("main").unwrap(),
            ahead: Some(2),
            set_upstream: false,
        });
        report.tag_conflicts.push(TagConflict {
            tag: TagName::new("v1").unwrap(),
            local: oid('a'),
            remote: oid('b'),
        });
        report.rejections.push(PushRejection {
            target: "main".into(),
            reason: RejectReason::NonFastForward,
            hint: None,
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["candidates"][0]["branch"], "main");
        assert_eq!(json["candidates"][0]["ahead"], 2);
        assert_eq!(json["rejections"][0]["reason"]["kind"], "non-fast-forward");
        assert!(!report.nothing_to_do());
        assert!(report.has_failures());
    }
}
