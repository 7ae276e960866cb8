//! engine::reconcile
//!
//! Bring local branches and tags up to date with the remote.
//!
//! # Steps
//!
//! 1. Preflight: unless forced, a dirty tree (tracked files) needs consent
//! 2. LFS hygiene: untrack LFS paths that no longer exist
//! 3. Fetch with prune (the only fatal network step)
//! 4. Offer tracking branches for remote branches missing locally
//! 5. Fast-forward every branch that is strictly behind its upstream
//! 6. Refresh tags, reporting conflicts and new arrivals
//! 7. Prune stale remote-tracking refs
//! 8. Summarize
//!
//! Steps after the fetch record failures and keep going.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::types::{BranchName, TagName};
use crate::git::{RefStore, Upstream};
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts::Confirm;

use super::delta::{self, BranchDelta};
use super::report::{
    BranchUpdate, BranchUpdateFailure, CreatedBranch, CreationFailure, Outcome, RepoSummary,
    StepError, SyncReport, TagConflict, UpdateFailureReason,
};
use super::EngineError;

/// How many recent tags to list when new tags arrive.
const LATEST_TAGS: usize = 5;

/// Options for one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Skip the dirty-tree confirmation.
    pub force: bool,
    /// Suppress progress narration.
    pub quiet: bool,
    /// Run the LFS hygiene step.
    pub lfs: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            quiet: false,
            lfs: true,
        }
    }
}

/// Synchronizes local refs with the remote.
pub struct Reconciler<'a, S: RefStore + ?Sized> {
    store: &'a S,
    prompt: &'a dyn Confirm,
    verbosity: Verbosity,
}

impl<'a, S: RefStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, prompt: &'a dyn Confirm, verbosity: Verbosity) -> Self {
        Self {
            store,
            prompt,
            verbosity,
        }
    }

    /// Run a full sync.
    ///
    /// # Errors
    ///
    /// - [`EngineError::RemoteUnreachable`] if the fetch fails
    /// - [`EngineError::Git`] if the repository cannot be read at all
    pub fn sync(&self, opts: &SyncOptions) -> Result<SyncReport, EngineError> {
        let started = Instant::now();
        let out = if opts.quiet {
            Verbosity::Quiet
        } else {
            self.verbosity
        };
        let remote = self.store.remote().to_string();
        let mut report = SyncReport::new(&remote);

        info!(%remote, force = opts.force, lfs = opts.lfs, "sync started");

        if !self.preflight(opts, out)? {
            report.outcome = Outcome::Aborted;
            info!("sync declined");
            return Ok(report);
        }

        // Before any fetch: tag auto-follow would otherwise hide new tags
        let tags_before: BTreeSet<TagName> =
            self.store.tags()?.into_iter().map(|t| t.name).collect();

        if opts.lfs {
            self.lfs_hygiene(&mut report, out);
        }

        output::print(format!("Fetching from {remote}..."), out);
        self.store
            .fetch(true)
            .map_err(|e| EngineError::from_remote(e, &remote))?;

        self.create_new_branches(&mut report, out)?;
        self.update_branches(&mut report, out)?;
        self.refresh_tags(&tags_before, &mut report, out)?;
        self.prune_stale(&mut report, out);

        match self.summarize() {
            Ok(summary) => report.summary = Some(summary),
            Err(e) => report.step_errors.push(StepError::new("summary", e)),
        }

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            elapsed_ms = report.elapsed_ms,
            failures = report.has_failures(),
            "sync finished"
        );
        Ok(report)
    }

    /// Returns false if the user declined to continue.
    fn preflight(&self, opts: &SyncOptions, out: Verbosity) -> Result<bool, EngineError> {
        if opts.force {
            return Ok(true);
        }

        let status = self.store.worktree_status()?;
        if status.is_clean() {
            return Ok(true);
        }

        debug!(?status, "dirty working tree");
        output::warn(
            format!(
                "working tree has uncommitted changes ({} staged, {} unstaged)",
                status.staged, status.unstaged
            ),
            out,
        );
        Ok(self.prompt.confirm("Continue syncing?", false)?)
    }

    fn lfs_hygiene(&self, report: &mut SyncReport, out: Verbosity) {
        let missing = match self.store.lfs_missing_files() {
            Ok(Some(missing)) => missing,
            Ok(None) => {
                debug!("git-lfs not installed, skipping LFS check");
                return;
            }
            Err(e) => {
                report.step_errors.push(StepError::new("lfs", e));
                return;
            }
        };
        if missing.is_empty() {
            return;
        }

        output::print(
            format!(
                "Untracking {} missing LFS file(s):\n{}",
                missing.len(),
                output::format_list(&missing, "  - ")
            ),
            out,
        );
        match self.store.lfs_untrack(&missing) {
            Ok(()) => report.lfs_untracked = missing,
            Err(e) => {
                warn!(error = %e, "lfs untrack failed");
                report.step_errors.push(StepError::new("lfs", e));
            }
        }
    }

    fn create_new_branches(
        &self,
        report: &mut SyncReport,
        out: Verbosity,
    ) -> Result<(), EngineError> {
        let local = self.store.local_branches()?;
        let remote = self.store.remote_branches()?;
        let new = delta::new_remote_branches(&local, &remote);
        report.new_remote_branches = new.clone();

        if new.is_empty() {
            output::print("No new remote branches.", out);
            return Ok(());
        }

        output::print(
            format!(
                "Found {} new remote branch(es):\n{}",
                new.len(),
                output::format_list(&new, "  - ")
            ),
            out,
        );
        if !self
            .prompt
            .confirm("Create local tracking branches for them?", true)?
        {
            report.creation_declined = true;
            return Ok(());
        }

        for name in new {
            let upstream = Upstream::new(self.store.remote(), name.clone());
            match self.store.create_tracking_branch(&name, &upstream) {
                Ok(tip) => {
                    debug!(branch = %name, "created");
                    output::print(format!("Created {name} tracking {upstream}"), out);
                    report.created.push(CreatedBranch {
                        branch: name,
                        upstream,
                        tip,
                    });
                }
                Err(e) => {
                    warn!(branch = %name, error = %e, "branch creation failed");
                    report.creation_failures.push(CreationFailure {
                        branch: name,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn update_branches(&self, report: &mut SyncReport, out: Verbosity) -> Result<(), EngineError> {
        let current = self.store.current_branch()?;
        let created: BTreeSet<&BranchName> = report.created.iter().map(|c| &c.branch).collect();

        let mut updated = Vec::new();
        let mut failures = Vec::new();
        let mut in_sync = Vec::new();
        let mut local_only = Vec::new();

        for name in self.store.local_branches()? {
            if created.contains(&name) {
                continue;
            }
            let is_current = current.as_ref() == Some(&name);

            let classified = match delta::classify_branch(self.store, &name) {
                Ok(d) => d,
                Err(e) => {
                    failures.push(BranchUpdateFailure {
                        branch: name,
                        reason: UpdateFailureReason::Failed {
                            message: e.to_string(),
                        },
                    });
                    continue;
                }
            };
            debug!(branch = %name, delta = ?classified, "classified");

            match classified {
                BranchDelta::InSync => in_sync.push(name),
                BranchDelta::LocalOnly => local_only.push(name),
                // Only remote-only names classify this way, and these names are local
                BranchDelta::NewRemote => debug!(branch = %name, "no local side, skipped"),
                BranchDelta::Diverged { ahead, behind } => {
                    let reason = if behind == 0 {
                        UpdateFailureReason::Unpushed { ahead }
                    } else {
                        UpdateFailureReason::Diverged { ahead, behind }
                    };
                    output::warn(format!("{name}: {reason}"), out);
                    failures.push(BranchUpdateFailure {
                        branch: name,
                        reason,
                    });
                }
                BranchDelta::FastForwardable {
                    local,
                    remote,
                    behind,
                } => {
                    let result = if is_current {
                        self.store.fast_forward_current().map(|_| ()).map_err(|e| {
                            UpdateFailureReason::NeedsManualMerge {
                                message: e.to_string(),
                            }
                        })
                    } else {
                        self.store
                            .move_branch_pointer(&name, &remote, &local)
                            .map_err(|e| UpdateFailureReason::Failed {
                                message: e.to_string(),
                            })
                    };

                    match result {
                        Ok(()) => {
                            output::print(
                                format!(
                                    "Fast-forwarded {name} by {behind} commit(s) ({} -> {})",
                                    local.short(7),
                                    remote.short(7)
                                ),
                                out,
                            );
                            updated.push(BranchUpdate {
                                branch: name,
                                from: local,
                                to: remote,
                                current: is_current,
                            });
                        }
                        Err(reason) => {
                            warn!(branch = %name, %reason, "update failed");
                            failures.push(BranchUpdateFailure {
                                branch: name,
                                reason,
                            });
                        }
                    }
                }
            }
        }

        report.updated = updated;
        report.update_failures = failures;
        report.in_sync = in_sync;
        report.local_only = local_only;
        Ok(())
    }

    fn refresh_tags(
        &self,
        before: &BTreeSet<TagName>,
        report: &mut SyncReport,
        out: Verbosity,
    ) -> Result<(), EngineError> {
        let local_tags = self.store.tags()?;

        match self.store.remote_tags() {
            Ok(remote_tags) => {
                report.unpublished_tags = local_tags
                    .iter()
                    .filter(|local| !remote_tags.iter().any(|r| r.name == local.name))
                    .map(|local| local.name.clone())
                    .collect();
                if !report.unpublished_tags.is_empty() {
                    debug!(tags = ?report.unpublished_tags, "local tags missing on remote, kept");
                }

                for remote in remote_tags {
                    if let Some(local) = local_tags.iter().find(|t| t.name == remote.name) {
                        if local.target != remote.target {
                            output::warn(
                                format!(
                                    "tag {} differs from {} ({} locally, {} on remote); left as is",
                                    remote.name,
                                    self.store.remote(),
                                    local.target.short(7),
                                    remote.target.short(7)
                                ),
                                out,
                            );
                            report.tag_conflicts.push(TagConflict {
                                tag: remote.name,
                                local: local.target.clone(),
                                remote: remote.target,
                            });
                        }
                    }
                }
            }
            Err(e) => report.step_errors.push(StepError::new("tags", e)),
        }

        if let Err(e) = self.store.fetch_tags(true) {
            // Conflicting tags make the fetch fail; they are already reported
            if report.tag_conflicts.is_empty() {
                report.step_errors.push(StepError::new("tags", e));
            } else {
                debug!(error = %e, "tag fetch reported conflicts");
            }
        }

        let new_tags: Vec<TagName> = self
            .store
            .tags()?
            .into_iter()
            .map(|t| t.name)
            .filter(|name| !before.contains(name))
            .collect();

        if !new_tags.is_empty() {
            output::print(format!("Fetched {} new tag(s).", new_tags.len()), out);
            match self.store.latest_tags(LATEST_TAGS) {
                Ok(latest) => {
                    output::print(
                        format!("Latest tags:\n{}", output::format_list(&latest, "  - ")),
                        out,
                    );
                    report.latest_tags = latest;
                }
                Err(e) => report.step_errors.push(StepError::new("tags", e)),
            }
        }
        report.new_tags = new_tags;
        Ok(())
    }

    fn prune_stale(&self, report: &mut SyncReport, out: Verbosity) {
        let stale = match self.store.stale_remote_refs() {
            Ok(stale) => stale,
            Err(e) => {
                report.step_errors.push(StepError::new("prune", e));
                return;
            }
        };
        if stale.is_empty() {
            return;
        }

        match self.store.prune_remote_refs() {
            Ok(pruned) => {
                output::print(
                    format!(
                        "Pruned {} stale remote-tracking ref(s):\n{}",
                        pruned.len(),
                        output::format_list(&pruned, "  - ")
                    ),
                    out,
                );
                report.pruned = pruned;
            }
            Err(e) => report.step_errors.push(StepError::new("prune", e)),
        }
    }

    fn summarize(&self) -> Result<RepoSummary, EngineError> {
        Ok(RepoSummary {
            current_branch: self.store.current_branch()?,
            local_branches: self.store.local_branches()?.len(),
            remote_branches: self.store.remote_branches()?.len(),
            tags: self.store.tags()?.len(),
            latest_commit: self.store.latest_commit()?,
        })
    }
}
