//! git::mock
//!
//! In-memory [`RefStore`] for deterministic testing.
//!
//! # Design
//!
//! The mock keeps three views of the world, like a real clone does:
//!
//! - the local repository (commit graph, branches, upstream config, tags)
//! - the remote-tracking refs (`refs/remotes/<remote>/*`), updated by `fetch`
//! - the server itself (its branches and tags), updated by pushes
//!
//! Tests arrange state with the builder methods, inject failures with
//! [`FailOn`], run the engine, then inspect [`MockRefStore::operations`] or
//! compare [`MockRefStore::snapshot`]s.
//!
//! # Example
//!
//! ```
//! use refsync::git::mock::MockRefStore;
//! use refsync::git::RefStore;
//!
//! let store = MockRefStore::new();
//! let base = store.commit(&[], "initial");
//! store.track("main", &base);
//! store.checkout("main");
//!
//! let next = store.commit(&[&base], "remote work");
//! store.set_server_branch("main", &next);
//! store.fetch(true).unwrap();
//!
//! assert_eq!(store.ahead_count(&base, &next).unwrap(), 1);
//! assert_eq!(store.network_calls(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::core::types::{BranchName, Oid, RefName, TagName};

use super::interface::GitError;
use super::store::{
    CommitSummary, PushMode, RefStore, RejectReason, TagRef, Upstream, WorktreeStatus,
};

/// Mock repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockRefStore {
    remote: String,
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Head {
    Branch(BranchName),
    Detached(Oid),
}

#[derive(Debug)]
struct MockInner {
    next_commit: u64,
    parents: HashMap<Oid, Vec<Oid>>,
    subjects: HashMap<Oid, String>,
    head: Head,
    branches: BTreeMap<BranchName, Oid>,
    upstreams: BTreeMap<BranchName, Upstream>,
    tracking: BTreeMap<BranchName, Oid>,
    server_branches: BTreeMap<BranchName, Oid>,
    tags: BTreeMap<TagName, Oid>,
    /// Creation order of local tags, oldest first.
    tag_order: Vec<TagName>,
    server_tags: BTreeMap<TagName, Oid>,
    worktree: WorktreeStatus,
    identity: String,
    lfs_missing: Option<Vec<String>>,
    /// Paths moved to LFS with `lfs_track`.
    lfs_tracked: Vec<String>,
    fail_on: Vec<FailOn>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// `fetch` reports the remote unreachable.
    Fetch,
    /// `fetch_tags` fails.
    FetchTags,
    /// `remote_tags` reports the remote unreachable.
    RemoteTags,
    /// Creating this branch fails.
    CreateBranch(BranchName),
    /// `fast_forward_current` is refused.
    FastForward,
    /// Moving this branch fails.
    MoveBranch(BranchName),
    /// `commit_all` fails.
    CommitAll,
    /// Pushing this branch is rejected with the given reason. A
    /// `LargeFile` rejection stops once the file is LFS-tracked.
    PushBranch(BranchName, RejectReason),
    /// Pushing tags is rejected with the given reason.
    PushTags(RejectReason),
    /// `lfs_untrack` fails.
    LfsUntrack,
    /// `lfs_track` fails.
    LfsTrack,
}

/// Recorded mutation or network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Fetch { prune: bool },
    FetchTags { prune: bool },
    RemoteTags,
    CreateTrackingBranch { name: BranchName, upstream: Upstream },
    FastForwardCurrent { branch: BranchName },
    MoveBranchPointer { name: BranchName, target: Oid },
    PruneRemoteRefs,
    CommitAll { message: String },
    PushBranch { name: BranchName, mode: PushMode },
    PushTags { tags: Vec<TagName> },
    LfsUntrack { paths: Vec<String> },
    UndoLastCommit,
    LfsTrack { path: String },
    CommitStaged { message: String },
}

impl MockOperation {
    fn is_network(&self) -> bool {
        matches!(
            self,
            MockOperation::Fetch { .. }
                | MockOperation::FetchTags { .. }
                | MockOperation::RemoteTags
                | MockOperation::PushBranch { .. }
                | MockOperation::PushTags { .. }
        )
    }
}

/// Observable repository state, for before/after comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSnapshot {
    pub head: Option<BranchName>,
    pub branches: BTreeMap<BranchName, Oid>,
    pub upstreams: BTreeMap<BranchName, Upstream>,
    pub tracking: BTreeMap<BranchName, Oid>,
    pub server_branches: BTreeMap<BranchName, Oid>,
    pub tags: BTreeMap<TagName, Oid>,
    pub server_tags: BTreeMap<TagName, Oid>,
    pub worktree: WorktreeStatus,
    pub commit_count: usize,
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).expect("valid branch name")
}

fn tag(name: &str) -> TagName {
    TagName::new(name).expect("valid tag name")
}

impl Default for MockRefStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRefStore {
    /// Create an empty repository whose remote is `origin`, on an unborn `main`.
    pub fn new() -> Self {
        Self::with_remote("origin")
    }

    /// Create an empty repository bound to `remote`.
    pub fn with_remote(remote: &str) -> Self {
        Self {
            remote: remote.to_string(),
            inner: Arc::new(Mutex::new(MockInner {
                next_commit: 1,
                parents: HashMap::new(),
                subjects: HashMap::new(),
                head: Head::Branch(branch("main")),
                branches: BTreeMap::new(),
                upstreams: BTreeMap::new(),
                tracking: BTreeMap::new(),
                server_branches: BTreeMap::new(),
                tags: BTreeMap::new(),
                tag_order: Vec::new(),
                server_tags: BTreeMap::new(),
                worktree: WorktreeStatus::default(),
                identity: "tester".to_string(),
                lfs_missing: None,
                lfs_tracked: Vec::new(),
                fail_on: Vec::new(),
                operations: Vec::new(),
            })),
        }
    }

    // -------------------------------------------------------------------------
    // Arrangement
    // -------------------------------------------------------------------------

    /// Add a commit with the given parents and return its id.
    pub fn commit(&self, parents: &[&Oid], subject: &str) -> Oid {
        self.inner
            .lock()
            .unwrap()
            .new_commit(parents.iter().map(|p| (*p).clone()).collect(), subject)
    }

    /// Create or move a local branch.
    pub fn set_branch(&self, name: &str, tip: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.branches.insert(branch(name), tip.clone());
    }

    /// Point HEAD at a branch.
    pub fn checkout(&self, name: &str) {
        self.inner.lock().unwrap().head = Head::Branch(branch(name));
    }

    /// Detach HEAD at a commit.
    pub fn detach(&self, at: &Oid) {
        self.inner.lock().unwrap().head = Head::Detached(at.clone());
    }

    /// Configure `name` to track `<remote>/<remote_branch>`.
    pub fn set_upstream(&self, name: &str, remote_branch: &str) {
        self.set_upstream_on(name, &self.remote, remote_branch);
    }

    /// Configure `name` to track a branch on another remote.
    pub fn set_upstream_on(&self, name: &str, remote: &str, remote_branch: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .upstreams
            .insert(branch(name), Upstream::new(remote, branch(remote_branch)));
    }

    /// Set the remote-tracking ref, as if last fetched at `tip`.
    pub fn set_tracking(&self, name: &str, tip: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.tracking.insert(branch(name), tip.clone());
    }

    /// Set a branch on the server. Visible locally after the next fetch.
    pub fn set_server_branch(&self, name: &str, tip: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.server_branches.insert(branch(name), tip.clone());
    }

    /// Delete a branch on the server.
    pub fn remove_server_branch(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.server_branches.remove(&branch(name));
    }

    /// A published branch: local, tracking and server all at `tip`, upstream set.
    pub fn track(&self, name: &str, tip: &Oid) {
        self.set_branch(name, tip);
        self.set_tracking(name, tip);
        self.set_server_branch(name, tip);
        self.set_upstream(name, name);
    }

    /// Create a local tag.
    pub fn set_tag(&self, name: &str, target: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        let name = tag(name);
        inner.tag_order.retain(|t| t != &name);
        inner.tag_order.push(name.clone());
        inner.tags.insert(name, target.clone());
    }

    /// Create a tag on the server.
    pub fn set_server_tag(&self, name: &str, target: &Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.server_tags.insert(tag(name), target.clone());
    }

    /// Set the working tree status.
    pub fn set_worktree(&self, status: WorktreeStatus) {
        self.inner.lock().unwrap().worktree = status;
    }

    /// Set the committer name.
    pub fn set_identity(&self, identity: &str) {
        self.inner.lock().unwrap().identity = identity.to_string();
    }

    /// Install LFS with the given tracked-but-missing paths.
    pub fn set_lfs_missing(&self, paths: &[&str]) {
        self.inner.lock().unwrap().lfs_missing =
            Some(paths.iter().map(|p| p.to_string()).collect());
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on.push(fail_on);
        }
        self
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Number of operations that would have contacted the remote.
    pub fn network_calls(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| op.is_network())
            .count()
    }

    /// Tip of a local branch.
    pub fn branch(&self, name: &str) -> Option<Oid> {
        self.inner.lock().unwrap().branches.get(&branch(name)).cloned()
    }

    /// Tip of a branch on the server.
    pub fn server_branch(&self, name: &str) -> Option<Oid> {
        self.inner
            .lock()
            .unwrap()
            .server_branches
            .get(&branch(name))
            .cloned()
    }

    /// Target of a tag on the server.
    pub fn server_tag(&self, name: &str) -> Option<Oid> {
        self.inner.lock().unwrap().server_tags.get(&tag(name)).cloned()
    }

    /// Paths moved to LFS so far.
    pub fn lfs_tracked(&self) -> Vec<String> {
        self.inner.lock().unwrap().lfs_tracked.clone()
    }

    /// Capture the observable state.
    pub fn snapshot(&self) -> MockSnapshot {
        let inner = self.inner.lock().unwrap();
        MockSnapshot {
            head: match &inner.head {
                Head::Branch(name) => Some(name.clone()),
                Head::Detached(_) => None,
            },
            branches: inner.branches.clone(),
            upstreams: inner.upstreams.clone(),
            tracking: inner.tracking.clone(),
            server_branches: inner.server_branches.clone(),
            tags: inner.tags.clone(),
            server_tags: inner.server_tags.clone(),
            worktree: inner.worktree.clone(),
            commit_count: inner.parents.len(),
        }
    }

    fn record(&self, op: MockOperation) {
        self.inner.lock().unwrap().operations.push(op);
    }

    /// Whether LFS tracking already covers a large-file rejection.
    fn lfs_resolves(&self, reason: &RejectReason) -> bool {
        let tracked = &self.inner.lock().unwrap().lfs_tracked;
        match reason {
            RejectReason::LargeFile { path: Some(path) } => tracked.contains(path),
            RejectReason::LargeFile { path: None } => !tracked.is_empty(),
            _ => false,
        }
    }

    fn should_fail(&self, pred: impl Fn(&FailOn) -> bool) -> Option<FailOn> {
        self.inner
            .lock()
            .unwrap()
            .fail_on
            .iter()
            .find(|f| pred(f))
            .cloned()
    }

    fn unreachable(&self) -> GitError {
        GitError::RemoteUnreachable {
            remote: self.remote.clone(),
            message: "mock: remote unreachable".to_string(),
        }
    }
}

impl MockInner {
    fn new_commit(&mut self, parents: Vec<Oid>, subject: &str) -> Oid {
        let oid = Oid::new(format!("{:040x}", self.next_commit)).expect("generated oid");
        self.next_commit += 1;
        self.parents.insert(oid.clone(), parents);
        self.subjects.insert(oid.clone(), subject.to_string());
        oid
    }

    fn reachable(&self, tip: &Oid) -> HashSet<Oid> {
        let mut seen = HashSet::new();
        let mut stack = vec![tip.clone()];
        while let Some(oid) = stack.pop() {
            if !seen.insert(oid.clone()) {
                continue;
            }
            if let Some(parents) = self.parents.get(&oid) {
                stack.extend(parents.iter().cloned());
            }
        }
        seen
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> bool {
        self.reachable(descendant).contains(ancestor)
    }

    fn head_tip(&self) -> Option<Oid> {
        match &self.head {
            Head::Branch(name) => self.branches.get(name).cloned(),
            Head::Detached(oid) => Some(oid.clone()),
        }
    }

    fn current_branch(&self) -> Option<BranchName> {
        match &self.head {
            Head::Branch(name) if self.branches.contains_key(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn stale_tracking(&self) -> Vec<BranchName> {
        self.tracking
            .keys()
            .filter(|name| !self.server_branches.contains_key(*name))
            .cloned()
            .collect()
    }
}

impl RefStore for MockRefStore {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        Ok(self.inner.lock().unwrap().current_branch())
    }

    fn unborn_branch(&self) -> Result<Option<BranchName>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(match &inner.head {
            Head::Branch(name) if !inner.branches.contains_key(name) => Some(name.clone()),
            _ => None,
        })
    }

    fn local_branches(&self) -> Result<Vec<BranchName>, GitError> {
        Ok(self.inner.lock().unwrap().branches.keys().cloned().collect())
    }

    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError> {
        Ok(self.inner.lock().unwrap().tracking.keys().cloned().collect())
    }

    fn tags(&self) -> Result<Vec<TagRef>, GitError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tags
            .iter()
            .map(|(name, target)| TagRef {
                name: name.clone(),
                target: target.clone(),
            })
            .collect())
    }

    fn remote_tags(&self) -> Result<Vec<TagRef>, GitError> {
        self.record(MockOperation::RemoteTags);
        if self.should_fail(|f| f == &FailOn::RemoteTags).is_some() {
            return Err(self.unreachable());
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .server_tags
            .iter()
            .map(|(name, target)| TagRef {
                name: name.clone(),
                target: target.clone(),
            })
            .collect())
    }

    fn upstream_of(&self, branch: &BranchName) -> Result<Option<Upstream>, GitError> {
        Ok(self.inner.lock().unwrap().upstreams.get(branch).cloned())
    }

    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        Ok(self.inner.lock().unwrap().branches.get(branch).cloned())
    }

    fn tracking_tip(&self, upstream: &Upstream) -> Result<Option<Oid>, GitError> {
        if upstream.remote != self.remote {
            return Ok(None);
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .tracking
            .get(&upstream.branch)
            .cloned())
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        Ok(self.inner.lock().unwrap().is_ancestor(ancestor, descendant))
    }

    fn ahead_count(&self, from: &Oid, to: &Oid) -> Result<usize, GitError> {
        let inner = self.inner.lock().unwrap();
        let hidden = inner.reachable(from);
        Ok(inner
            .reachable(to)
            .iter()
            .filter(|oid| !hidden.contains(*oid))
            .count())
    }

    fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        Ok(self.inner.lock().unwrap().worktree.clone())
    }

    fn latest_commit(&self) -> Result<Option<CommitSummary>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.head_tip().map(|oid| CommitSummary {
            summary: inner.subjects.get(&oid).cloned().unwrap_or_default(),
            oid,
        }))
    }

    fn latest_tags(&self, limit: usize) -> Result<Vec<TagName>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tag_order
            .iter()
            .rev()
            .filter(|t| inner.tags.contains_key(*t))
            .take(limit)
            .cloned()
            .collect())
    }

    fn identity(&self) -> Result<String, GitError> {
        Ok(self.inner.lock().unwrap().identity.clone())
    }

    fn stale_remote_refs(&self) -> Result<Vec<RefName>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .stale_tracking()
            .iter()
            .map(|name| RefName::for_remote_branch(&self.remote, name))
            .collect())
    }

    fn lfs_missing_files(&self) -> Result<Option<Vec<String>>, GitError> {
        Ok(self.inner.lock().unwrap().lfs_missing.clone())
    }

    fn fetch(&self, prune: bool) -> Result<(), GitError> {
        self.record(MockOperation::Fetch { prune });
        if self.should_fail(|f| f == &FailOn::Fetch).is_some() {
            return Err(self.unreachable());
        }

        let mut inner = self.inner.lock().unwrap();
        let server = inner.server_branches.clone();
        if prune {
            inner.tracking.retain(|name, _| server.contains_key(name));
        }
        inner.tracking.extend(server);

        // Tag auto-follow: tags pointing into fetched history come along
        let fetched: HashSet<Oid> = inner
            .tracking
            .values()
            .flat_map(|tip| inner.reachable(tip))
            .collect();
        let followed: Vec<(TagName, Oid)> = inner
            .server_tags
            .iter()
            .filter(|(name, target)| fetched.contains(*target) && !inner.tags.contains_key(*name))
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect();
        for (name, target) in followed {
            inner.tags.insert(name.clone(), target);
            inner.tag_order.push(name);
        }
        Ok(())
    }

    fn fetch_tags(&self, prune: bool) -> Result<(), GitError> {
        self.record(MockOperation::FetchTags { prune });
        if self.should_fail(|f| f == &FailOn::FetchTags).is_some() {
            return Err(GitError::CommandFailed {
                command: "git fetch --tags".to_string(),
                message: "mock: fetch failed".to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        let server = inner.server_tags.clone();
        let mut clobbered = Vec::new();

        for (name, target) in &server {
            match inner.tags.get(name) {
                None => {
                    inner.tags.insert(name.clone(), target.clone());
                    inner.tag_order.push(name.clone());
                }
                Some(local) if local != target => clobbered.push(name.to_string()),
                Some(_) => {}
            }
        }
        if prune {
            let server_branches = inner.server_branches.clone();
            inner.tracking.retain(|name, _| server_branches.contains_key(name));
        }

        if clobbered.is_empty() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                command: "git fetch --tags".to_string(),
                message: format!("would clobber existing tag: {}", clobbered.join(", ")),
            })
        }
    }

    fn create_tracking_branch(
        &self,
        name: &BranchName,
        upstream: &Upstream,
    ) -> Result<Oid, GitError> {
        self.record(MockOperation::CreateTrackingBranch {
            name: name.clone(),
            upstream: upstream.clone(),
        });
        if self
            .should_fail(|f| f == &FailOn::CreateBranch(name.clone()))
            .is_some()
        {
            return Err(GitError::Internal {
                message: format!("mock: cannot create {name}"),
            });
        }

        let tip = self
            .tracking_tip(upstream)?
            .ok_or_else(|| GitError::RefNotFound {
                refname: upstream.tracking_ref().to_string(),
            })?;

        let mut inner = self.inner.lock().unwrap();
        if inner.branches.contains_key(name) {
            return Err(GitError::BranchExists {
                branch: name.to_string(),
            });
        }
        inner.branches.insert(name.clone(), tip.clone());
        inner.upstreams.insert(name.clone(), upstream.clone());
        Ok(tip)
    }

    fn fast_forward_current(&self) -> Result<Oid, GitError> {
        let current = self.current_branch()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        self.record(MockOperation::FastForwardCurrent {
            branch: current.clone(),
        });

        let not_ff = |message: &str| GitError::NotFastForward {
            branch: current.to_string(),
            message: message.to_string(),
        };

        if self.should_fail(|f| f == &FailOn::FastForward).is_some() {
            return Err(not_ff("mock: merge refused"));
        }

        let upstream = self
            .upstream_of(&current)?
            .ok_or_else(|| not_ff("no upstream configured"))?;
        let target = self
            .tracking_tip(&upstream)?
            .ok_or_else(|| not_ff("upstream ref missing"))?;

        let mut inner = self.inner.lock().unwrap();
        let local = inner
            .branches
            .get(&current)
            .cloned()
            .ok_or_else(|| not_ff("branch has no commits"))?;
        if !inner.is_ancestor(&local, &target) {
            return Err(not_ff("Not possible to fast-forward, aborting."));
        }
        inner.branches.insert(current, target.clone());
        Ok(target)
    }

    fn move_branch_pointer(
        &self,
        name: &BranchName,
        target: &Oid,
        expected_old: &Oid,
    ) -> Result<(), GitError> {
        self.record(MockOperation::MoveBranchPointer {
            name: name.clone(),
            target: target.clone(),
        });
        if self.current_branch()?.as_ref() == Some(name) {
            return Err(GitError::BranchCheckedOut {
                branch: name.to_string(),
            });
        }
        if self
            .should_fail(|f| f == &FailOn::MoveBranch(name.clone()))
            .is_some()
        {
            return Err(GitError::Internal {
                message: format!("mock: cannot move {name}"),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        let refname = RefName::for_branch(name);
        match inner.branches.get(name) {
            Some(actual) if actual == expected_old => {}
            other => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old.to_string(),
                    actual: other.map_or_else(|| "<none>".to_string(), |o| o.to_string()),
                })
            }
        }
        inner.branches.insert(name.clone(), target.clone());
        Ok(())
    }

    fn prune_remote_refs(&self) -> Result<Vec<RefName>, GitError> {
        self.record(MockOperation::PruneRemoteRefs);
        let mut inner = self.inner.lock().unwrap();
        let stale = inner.stale_tracking();
        for name in &stale {
            inner.tracking.remove(name);
        }
        Ok(stale
            .iter()
            .map(|name| RefName::for_remote_branch(&self.remote, name))
            .collect())
    }

    fn commit_all(&self, message: &str) -> Result<Option<Oid>, GitError> {
        self.record(MockOperation::CommitAll {
            message: message.to_string(),
        });
        if self.should_fail(|f| f == &FailOn::CommitAll).is_some() {
            return Err(GitError::CommandFailed {
                command: "git commit".to_string(),
                message: "mock: commit failed".to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        if !inner.worktree.has_changes() {
            return Ok(None);
        }

        let parents = inner.head_tip().into_iter().collect();
        let oid = inner.new_commit(parents, message);
        match inner.head.clone() {
            Head::Branch(name) => {
                inner.branches.insert(name, oid.clone());
            }
            Head::Detached(_) => inner.head = Head::Detached(oid.clone()),
        }
        inner.worktree = WorktreeStatus::default();
        Ok(Some(oid))
    }

    fn push_branch(&self, name: &BranchName, mode: PushMode) -> Result<(), GitError> {
        self.record(MockOperation::PushBranch {
            name: name.clone(),
            mode,
        });

        let rejected = |reason: RejectReason| GitError::PushRejected {
            target: name.to_string(),
            message: reason.to_string(),
            reason,
        };

        if let Some(FailOn::PushBranch(_, reason)) =
            self.should_fail(|f| matches!(f, FailOn::PushBranch(n, _) if n == name))
        {
            if !self.lfs_resolves(&reason) {
                return Err(rejected(reason));
            }
        }

        let mut inner = self.inner.lock().unwrap();
        let local = inner
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                refname: RefName::for_branch(name).to_string(),
            })?;

        let dest = match inner.upstreams.get(name) {
            Some(up) if up.remote == self.remote && !mode.set_upstream => up.branch.clone(),
            _ => name.clone(),
        };
        let server = inner.server_branches.get(&dest).cloned();

        if mode.force_with_lease {
            if server != inner.tracking.get(&dest).cloned() {
                return Err(rejected(RejectReason::StaleLease));
            }
        } else if let Some(server) = &server {
            if !inner.is_ancestor(server, &local) {
                return Err(rejected(RejectReason::NonFastForward));
            }
        }

        inner.server_branches.insert(dest.clone(), local.clone());
        inner.tracking.insert(dest.clone(), local);
        if mode.set_upstream {
            inner
                .upstreams
                .insert(name.clone(), Upstream::new(self.remote.clone(), dest));
        }
        Ok(())
    }

    fn push_tags(&self, tags: &[TagName]) -> Result<(), GitError> {
        self.record(MockOperation::PushTags {
            tags: tags.to_vec(),
        });

        let rejected = |reason: RejectReason| GitError::PushRejected {
            target: "tags".to_string(),
            message: reason.to_string(),
            reason,
        };

        if let Some(FailOn::PushTags(reason)) =
            self.should_fail(|f| matches!(f, FailOn::PushTags(_)))
        {
            return Err(rejected(reason));
        }

        let mut inner = self.inner.lock().unwrap();
        let mut refused = Vec::new();
        for name in tags {
            let Some(target) = inner.tags.get(name).cloned() else {
                refused.push(name.to_string());
                continue;
            };
            match inner.server_tags.get(name) {
                Some(existing) if existing != &target => refused.push(name.to_string()),
                _ => {
                    inner.server_tags.insert(name.clone(), target);
                }
            }
        }

        if refused.is_empty() {
            Ok(())
        } else {
            Err(rejected(RejectReason::Other {
                message: format!("tag already exists: {}", refused.join(", ")),
            }))
        }
    }

    fn lfs_untrack(&self, paths: &[String]) -> Result<(), GitError> {
        self.record(MockOperation::LfsUntrack {
            paths: paths.to_vec(),
        });
        if self.should_fail(|f| f == &FailOn::LfsUntrack).is_some() {
            return Err(GitError::CommandFailed {
                command: "git lfs untrack".to_string(),
                message: "mock: lfs failed".to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(missing) = inner.lfs_missing.as_mut() {
            missing.retain(|p| !paths.contains(p));
        }
        inner.worktree.staged += 1;
        Ok(())
    }

    fn undo_last_commit(&self) -> Result<String, GitError> {
        self.record(MockOperation::UndoLastCommit);
        let mut inner = self.inner.lock().unwrap();
        let current = inner.current_branch().ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        let tip = inner.branches[&current].clone();
        let parent = inner
            .parents
            .get(&tip)
            .and_then(|p| p.first())
            .cloned()
            .ok_or_else(|| GitError::Internal {
                message: format!("commit {tip} has no parent to reset to"),
            })?;

        inner.branches.insert(current, parent);
        inner.worktree.staged = inner.worktree.staged.max(1);
        Ok(inner.subjects.get(&tip).cloned().unwrap_or_default())
    }

    fn lfs_track(&self, path: &str) -> Result<(), GitError> {
        self.record(MockOperation::LfsTrack {
            path: path.to_string(),
        });
        if self.should_fail(|f| f == &FailOn::LfsTrack).is_some() {
            return Err(GitError::CommandFailed {
                command: "git lfs track".to_string(),
                message: "mock: git-lfs is not installed".to_string(),
            });
        }
        self.inner.lock().unwrap().lfs_tracked.push(path.to_string());
        Ok(())
    }

    fn commit_staged(&self, message: &str) -> Result<Oid, GitError> {
        self.record(MockOperation::CommitStaged {
            message: message.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        let current = inner.current_branch().ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        let parents = inner.head_tip().into_iter().collect();
        let oid = inner.new_commit(parents, message);
        inner.branches.insert(current, oid.clone());
        inner.worktree.staged = 0;
        Ok(oid)
    }
}
