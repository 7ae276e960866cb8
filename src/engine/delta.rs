//! engine::delta
//!
//! Classification of branches and the working tree, computed fresh per
//! invocation from [`RefStore`] queries.
//!
//! # Reconciliation
//!
//! | local vs tracking | [`BranchDelta`] |
//! |---|---|
//! | only a tracking ref | `NewRemote` |
//! | no upstream, other remote, or tracking ref gone | `LocalOnly` |
//! | equal | `InSync` |
//! | local is an ancestor | `FastForwardable` |
//! | anything else | `Diverged` |
//!
//! Sync finds `NewRemote` branches in bulk with [`new_remote_branches`];
//! names taken from the local branch list never classify as `NewRemote`.
//!
//! # Publishing
//!
//! A branch is pushed iff it has no usable upstream or is strictly ahead of
//! it ([`PushClass`]).

use serde::Serialize;

use crate::core::types::{BranchName, Oid};
use crate::git::{GitError, RefStore, Upstream, WorktreeStatus};

/// Relationship between a local branch and its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum BranchDelta {
    /// Exists only on the remote.
    NewRemote,
    /// Local tip is a strict ancestor of the remote tip.
    FastForwardable {
        local: Oid,
        remote: Oid,
        behind: usize,
    },
    /// Local has commits the remote does not; `behind == 0` means the
    /// branch is merely unpushed.
    Diverged { ahead: usize, behind: usize },
    /// Same commit on both sides.
    InSync,
    /// Nothing to compare against.
    LocalOnly,
}

/// The upstream a branch can be compared against: configured, on the
/// remote being synced, with a tracking ref present.
pub fn usable_upstream<S: RefStore + ?Sized>(
    store: &S,
    branch: &BranchName,
) -> Result<Option<(Upstream, Oid)>, GitError> {
    let Some(upstream) = store.upstream_of(branch)? else {
        return Ok(None);
    };
    if upstream.remote != store.remote() {
        return Ok(None);
    }
    Ok(store
        .tracking_tip(&upstream)?
        .map(|tip| (upstream, tip)))
}

/// Remote branches with no local branch of the same name ([`BranchDelta::NewRemote`]).
pub fn new_remote_branches(local: &[BranchName], remote: &[BranchName]) -> Vec<BranchName> {
    remote
        .iter()
        .filter(|name| !local.contains(name))
        .cloned()
        .collect()
}

/// Classify a local branch against its upstream.
pub fn classify_branch<S: RefStore + ?Sized>(
    store: &S,
    branch: &BranchName,
) -> Result<BranchDelta, GitError> {
    let Some(local) = store.branch_tip(branch)? else {
        let upstream = Upstream::new(store.remote(), branch.clone());
        return Ok(match store.tracking_tip(&upstream)? {
            Some(_) => BranchDelta::NewRemote,
            None => BranchDelta::LocalOnly,
        });
    };
    let Some((_, remote)) = usable_upstream(store, branch)? else {
        return Ok(BranchDelta::LocalOnly);
    };

    if local == remote {
        return Ok(BranchDelta::InSync);
    }

    let behind = store.ahead_count(&local, &remote)?;
    if store.is_ancestor(&local, &remote)? {
        return Ok(BranchDelta::FastForwardable {
            local,
            remote,
            behind,
        });
    }

    Ok(BranchDelta::Diverged {
        ahead: store.ahead_count(&remote, &local)?,
        behind,
    })
}

/// Whether a branch needs publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "kebab-case")]
pub enum PushClass {
    /// No upstream (or its tracking ref is gone): push with `-u`.
    AheadUntracked,
    /// Strictly ahead of the upstream.
    AheadTracked { upstream: Upstream, ahead: usize },
    /// Nothing to publish; `behind` commits are only on the remote.
    UpToDate { behind: usize },
}

impl PushClass {
    /// Whether the branch is selected for pushing.
    pub fn is_candidate(&self) -> bool {
        !matches!(self, PushClass::UpToDate { .. })
    }
}

/// Classify a local branch for publishing.
///
/// `pending` counts commits that will exist on the branch before the push
/// (a planned auto-commit).
pub fn classify_push<S: RefStore + ?Sized>(
    store: &S,
    branch: &BranchName,
    local: &Oid,
    pending: usize,
) -> Result<PushClass, GitError> {
    let Some((upstream, remote)) = usable_upstream(store, branch)? else {
        return Ok(PushClass::AheadUntracked);
    };

    let ahead = store.ahead_count(&remote, local)? + pending;
    if ahead > 0 {
        return Ok(PushClass::AheadTracked { upstream, ahead });
    }

    Ok(PushClass::UpToDate {
        behind: store.ahead_count(local, &remote)?,
    })
}

/// Working-tree state, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeState {
    /// Modified, deleted, untracked or conflicted files.
    UnstagedChanges,
    /// Only staged changes.
    StagedChanges,
    /// Clean tree, current branch has commits to publish.
    CommittedUnpushed,
    /// Nothing to commit or publish on the current branch.
    Clean,
}

impl TreeState {
    /// Classify from the worktree status and whether the current branch
    /// has commits to publish.
    ///
    /// ```
    /// use refsync::engine::delta::TreeState;
    /// use refsync::git::WorktreeStatus;
    ///
    /// let status = WorktreeStatus { staged: 1, untracked: 1, ..Default::default() };
    /// assert_eq!(TreeState::classify(&status, true), TreeState::UnstagedChanges);
    /// assert_eq!(TreeState::classify(&WorktreeStatus::default(), true), TreeState::CommittedUnpushed);
    /// ```
    pub fn classify(status: &WorktreeStatus, current_ahead: bool) -> Self {
        if status.unstaged > 0 || status.untracked > 0 || status.has_conflicts {
            TreeState::UnstagedChanges
        } else if status.staged > 0 {
            TreeState::StagedChanges
        } else if current_ahead {
            TreeState::CommittedUnpushed
        } else {
            TreeState::Clean
        }
    }

    /// Whether a commit is needed before publishing.
    pub fn is_dirty(self) -> bool {
        matches!(self, TreeState::UnstagedChanges | TreeState::StagedChanges)
    }
}
