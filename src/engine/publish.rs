//! engine::publish
//!
//! Push local branches and tags that are strictly ahead of the remote.
//!
//! # Flow
//!
//! ```text
//! commit gate -> branch selection -> tag selection -> confirm -> [auto-commit] -> push branches -> push tags
//! ```
//!
//! The commit gate runs before anything touches the network: a dirty tree
//! without `--default` fails with zero remote calls. With `--default` the
//! auto-commit is only planned up front and made after confirmation, so
//! declining leaves the repository untouched.
//!
//! Branches are pushed one at a time and a rejection does not stop the
//! others. Tags go in one batch at the end.
//!
//! When the host refuses the current branch because of a file over its size
//! limit, the user may let refsync move that file to Git LFS: the last
//! commit is undone, the file is LFS-tracked, the commit is remade with an
//! `[LFS Added]` trailer and the push is retried. This rewrites local
//! history, so the offer defaults to no.

use chrono::Local;
use tracing::{debug, info, warn};

use crate::core::types::{BranchName, TagName};
use crate::git::{GitError, PushMode, RefStore, RejectReason};
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts::Confirm;

use super::delta::{self, PushClass, TreeState};
use super::report::{
    AutoCommit, LfsRewrite, Outcome, PushCandidate, PushRejection, PushReport, TagConflict,
};
use super::EngineError;

/// Options for one push run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Commit all pending changes before pushing.
    pub default_commit: bool,
    /// Only the current branch; no tags.
    pub current_only: bool,
    /// Only tags; skips branches and the commit gate.
    pub tags_only: bool,
    /// Force-with-lease the current branch after a typed confirmation.
    pub force: bool,
}

/// Message for the `--default` auto-commit.
///
/// ```
/// use chrono::NaiveDate;
/// use refsync::engine::publish::auto_commit_message;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(14, 5, 0).unwrap();
/// assert_eq!(
///     auto_commit_message("alice", at),
///     "[default commit from refsync] user: alice at 2024-03-09 14:05:00"
/// );
/// ```
pub fn auto_commit_message(identity: &str, at: chrono::NaiveDateTime) -> String {
    format!(
        "[default commit from refsync] user: {identity} at {}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Message for a commit remade after moving a file to Git LFS.
fn lfs_commit_message(original: &str) -> String {
    format!("{}\n\n[LFS Added]", original.trim_end())
}

/// Hint shown for a rejection, if there is something the user can do.
fn rejection_hint(reason: &RejectReason) -> Option<String> {
    match reason {
        RejectReason::LargeFile { path } => {
            let pattern = path.as_deref().unwrap_or("<file>");
            Some(format!(
                "track it with Git LFS: git lfs track '{pattern}', then rewrite the commit that added it"
            ))
        }
        RejectReason::NonFastForward => Some("run `refsync sync` first, then merge or rebase".into()),
        RejectReason::StaleLease => Some("fetch and review the remote branch before forcing".into()),
        _ => None,
    }
}

/// Publishes local refs to the remote.
pub struct Publisher<'a, S: RefStore + ?Sized> {
    store: &'a S,
    prompt: &'a dyn Confirm,
    verbosity: Verbosity,
}

impl<'a, S: RefStore + ?Sized> Publisher<'a, S> {
    pub fn new(store: &'a S, prompt: &'a dyn Confirm, verbosity: Verbosity) -> Self {
        Self {
            store,
            prompt,
            verbosity,
        }
    }

    /// Run a push.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UncommittedChanges`] on a dirty tree without `default_commit`
    /// - [`EngineError::DetachedHead`] when forcing on a detached HEAD
    /// - [`EngineError::UnbornBranch`] when forcing before the first commit
    /// - [`EngineError::RemoteUnreachable`] if remote tags cannot be listed
    pub fn push(&self, opts: &PushOptions) -> Result<PushReport, EngineError> {
        let out = self.verbosity;
        let mut report = PushReport::new(self.store.remote());
        let current = self.store.current_branch()?;

        info!(remote = %report.remote, ?opts, "push started");

        if opts.force && !opts.tags_only && current.is_none() {
            return Err(match self.store.unborn_branch()? {
                Some(branch) => EngineError::UnbornBranch {
                    branch: branch.to_string(),
                },
                None => EngineError::DetachedHead,
            });
        }

        if !opts.tags_only {
            self.plan_commit(opts, &mut report)?;
            self.select_branches(opts, current.as_ref(), &mut report)?;
        }
        if !opts.current_only && !opts.force {
            self.select_tags(&mut report)?;
        }

        if report.nothing_to_do() {
            debug!("nothing to push");
            return Ok(report);
        }

        self.show_plan(&report, out);
        if !self.confirm(opts, current.as_ref())? {
            report.outcome = Outcome::Aborted;
            info!("push declined");
            return Ok(report);
        }

        self.make_auto_commit(&mut report, out)?;
        self.push_branches(opts, current.as_ref(), &mut report, out)?;
        self.push_tags(&mut report, out);

        info!(
            pushed = report.pushed.len(),
            tags = report.tags_pushed.len(),
            rejected = report.rejections.len(),
            "push finished"
        );
        Ok(report)
    }

    /// Commit gate: fail on a dirty tree unless an auto-commit can be planned.
    fn plan_commit(&self, opts: &PushOptions, report: &mut PushReport) -> Result<(), EngineError> {
        let status = self.store.worktree_status()?;
        if !status.has_changes() {
            return Ok(());
        }

        if !opts.default_commit {
            return Err(EngineError::UncommittedChanges {
                staged: status.staged,
                unstaged: status.unstaged,
                untracked: status.untracked,
            });
        }

        let identity = self.store.identity()?;
        let message = auto_commit_message(&identity, Local::now().naive_local());
        debug!(%message, "planned auto-commit");
        report.auto_commit = Some(AutoCommit { message, oid: None });
        Ok(())
    }

    fn select_branches(
        &self,
        opts: &PushOptions,
        current: Option<&BranchName>,
        report: &mut PushReport,
    ) -> Result<(), EngineError> {
        let pending_commit = report.auto_commit.is_some();
        let names: Vec<BranchName> = if opts.current_only || opts.force {
            current.cloned().into_iter().collect()
        } else {
            self.store.local_branches()?
        };

        let mut current_ahead = false;
        for name in names {
            if let Some(upstream) = self.store.upstream_of(&name)? {
                if upstream.remote != self.store.remote() {
                    debug!(branch = %name, %upstream, "tracks another remote, skipped");
                    continue;
                }
            }
            let is_current = current == Some(&name);
            let Some(tip) = self.store.branch_tip(&name)? else {
                continue;
            };
            let pending = usize::from(is_current && pending_commit);

            let class = delta::classify_push(self.store, &name, &tip, pending)?;
            debug!(branch = %name, ?class, "classified");

            // Forcing may rewind the remote, so a behind branch still qualifies
            let forced_behind = opts.force && matches!(class, PushClass::UpToDate { behind } if behind > 0);

            match class {
                PushClass::AheadUntracked => {
                    current_ahead |= is_current;
                    report.candidates.push(PushCandidate {
                        branch: name,
                        ahead: None,
                        set_upstream: true,
                    });
                }
                PushClass::AheadTracked { ahead, .. } => {
                    current_ahead |= is_current;
                    report.candidates.push(PushCandidate {
                        branch: name,
                        ahead: Some(ahead),
                        set_upstream: false,
                    });
                }
                PushClass::UpToDate { .. } if forced_behind => {
                    report.candidates.push(PushCandidate {
                        branch: name,
                        ahead: Some(0),
                        set_upstream: false,
                    });
                }
                PushClass::UpToDate { .. } => report.up_to_date.push(name),
            }
        }

        let status = self.store.worktree_status()?;
        report.tree_state = Some(TreeState::classify(&status, current_ahead));
        report.forced = opts.force;
        Ok(())
    }

    fn select_tags(&self, report: &mut PushReport) -> Result<(), EngineError> {
        let local = self.store.tags()?;
        if local.is_empty() {
            return Ok(());
        }

        let remote = self
            .store
            .remote_tags()
            .map_err(|e| EngineError::from_remote(e, self.store.remote()))?;

        for tag in local {
            match remote.iter().find(|r| r.name == tag.name) {
                None => report.tag_candidates.push(tag.name),
                Some(r) if r.target != tag.target => report.tag_conflicts.push(TagConflict {
                    tag: tag.name,
                    local: tag.target,
                    remote: r.target.clone(),
                }),
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn show_plan(&self, report: &PushReport, out: Verbosity) {
        if let Some(commit) = &report.auto_commit {
            output::print(format!("Will commit all changes as:\n  {}", commit.message), out);
        }
        if !report.candidates.is_empty() {
            let lines: Vec<String> = report
                .candidates
                .iter()
                .map(|c| match c.ahead {
                    None => format!("{} (new branch, sets upstream)", c.branch),
                    Some(n) => format!("{} ({n} commit(s) ahead)", c.branch),
                })
                .collect();
            output::print(
                format!(
                    "Branches to push to {}:\n{}",
                    report.remote,
                    output::format_list(&lines, "  - ")
                ),
                out,
            );
        }
        if !report.tag_candidates.is_empty() {
            output::print(
                format!(
                    "Tags to push:\n{}",
                    output::format_list(&report.tag_candidates, "  - ")
                ),
                out,
            );
        }
        for conflict in &report.tag_conflicts {
            output::warn(
                format!(
                    "tag {} points to {} locally but {} on {}; not pushed",
                    conflict.tag,
                    conflict.local.short(7),
                    conflict.remote.short(7),
                    report.remote
                ),
                out,
            );
        }
    }

    fn confirm(&self, opts: &PushOptions, current: Option<&BranchName>) -> Result<bool, EngineError> {
        if opts.force && !opts.tags_only {
            let branch = current.map(|b| b.to_string()).unwrap_or_default();
            output::warn(
                format!("force-pushing {branch} may overwrite commits on the remote"),
                self.verbosity,
            );
            return Ok(self
                .prompt
                .confirm_exact(&format!("Force-push {branch} with lease?"), "yes")?);
        }
        Ok(self.prompt.confirm("Proceed with push?", true)?)
    }

    fn make_auto_commit(&self, report: &mut PushReport, out: Verbosity) -> Result<(), EngineError> {
        let Some(commit) = report.auto_commit.as_mut() else {
            return Ok(());
        };

        match self.store.commit_all(&commit.message)? {
            Some(oid) => {
                output::print(format!("Committed {}", oid.short(7)), out);
                commit.oid = Some(oid);
            }
            None => {
                warn!("auto-commit found nothing to commit");
                report
                    .warnings
                    .push("nothing to commit after staging".to_string());
            }
        }
        Ok(())
    }

    fn push_branches(
        &self,
        opts: &PushOptions,
        current: Option<&BranchName>,
        report: &mut PushReport,
        out: Verbosity,
    ) -> Result<(), EngineError> {
        let candidates = report.candidates.clone();
        for candidate in candidates {
            let mode = if opts.force {
                PushMode::force_with_lease(candidate.set_upstream)
            } else if candidate.set_upstream {
                PushMode::set_upstream()
            } else {
                PushMode::normal()
            };

            output::print(format!("Pushing {}...", candidate.branch), out);
            let err = match self.store.push_branch(&candidate.branch, mode) {
                Ok(()) => {
                    report.pushed.push(candidate.branch);
                    continue;
                }
                Err(e) => e,
            };

            let mut rejection = into_rejection(candidate.branch.to_string(), err);
            // Only HEAD's last commit can be rewritten in place
            let large_file = match &rejection.reason {
                RejectReason::LargeFile { path } if current == Some(&candidate.branch) => {
                    Some(path.clone())
                }
                _ => None,
            };
            if let Some(detected) = large_file {
                match self.move_to_lfs(&candidate.branch, detected, mode, report, out)? {
                    Some(Ok(())) => {
                        report.pushed.push(candidate.branch);
                        continue;
                    }
                    Some(Err(e)) => rejection = into_rejection(candidate.branch.to_string(), e),
                    None => {}
                }
            }
            warn!(target = %rejection.target, reason = %rejection.reason, "push rejected");
            report.rejections.push(rejection);
        }
        Ok(())
    }

    /// Offer to move a too-large file into Git LFS and retry the push.
    ///
    /// Returns the retried push's result, or `None` if nothing was retried.
    fn move_to_lfs(
        &self,
        branch: &BranchName,
        detected: Option<String>,
        mode: PushMode,
        report: &mut PushReport,
        out: Verbosity,
    ) -> Result<Option<Result<(), GitError>>, EngineError> {
        output::warn(
            format!("{branch}: the remote refused a file over its size limit"),
            out,
        );
        if !self.prompt.confirm(
            &format!("Rewrite the last commit of {branch} to store the file with Git LFS, then retry?"),
            false,
        )? {
            info!(%branch, "LFS rewrite declined");
            return Ok(None);
        }

        let path = match detected {
            Some(path) if self.prompt.confirm(&format!("Use detected path '{path}'?"), true)? => {
                Some(path)
            }
            _ => self.prompt.input("Path of the large file:")?,
        };
        let Some(path) = path else {
            report
                .warnings
                .push(format!("{branch}: no file path given; LFS rewrite skipped"));
            return Ok(None);
        };

        let original = match self.store.undo_last_commit() {
            Ok(message) => message,
            Err(e) => {
                report
                    .warnings
                    .push(format!("{branch}: could not undo the last commit: {e}"));
                return Ok(None);
            }
        };

        // Remake the commit as it was if tracking fails
        let (message, tracked) = match self.store.lfs_track(&path) {
            Ok(()) => (lfs_commit_message(&original), true),
            Err(e) => {
                report
                    .warnings
                    .push(format!("{branch}: could not track {path} with Git LFS: {e}"));
                (original, false)
            }
        };

        let commit = match self.store.commit_staged(&message) {
            Ok(oid) => oid,
            Err(e) => {
                warn!(%branch, error = %e, "recommit failed");
                report.warnings.push(format!(
                    "{branch}: the last commit was undone and its changes are still staged; commit them again: {e}"
                ));
                return Ok(None);
            }
        };
        if !tracked {
            return Ok(None);
        }

        output::print(
            format!("Moved {path} to Git LFS as {}; retrying push of {branch}...", commit.short(7)),
            out,
        );
        report.lfs_rewrites.push(LfsRewrite {
            branch: branch.clone(),
            path,
            commit,
        });
        Ok(Some(self.store.push_branch(branch, mode)))
    }

    fn push_tags(&self, report: &mut PushReport, out: Verbosity) {
        if report.tag_candidates.is_empty() {
            return;
        }
        let tags: Vec<TagName> = report.tag_candidates.clone();

        output::print(format!("Pushing {} tag(s)...", tags.len()), out);
        match self.store.push_tags(&tags) {
            Ok(()) => report.tags_pushed = tags,
            Err(e) => {
                let rejection = into_rejection("tags".to_string(), e);
                warn!(reason = %rejection.reason, "tag push rejected");
                report.rejections.push(rejection);
            }
        }
    }
}

fn into_rejection(target: String, err: GitError) -> PushRejection {
    let reason = match err {
        GitError::PushRejected { reason, .. } => reason,
        GitError::RemoteUnreachable { .. } => RejectReason::Network,
        other => RejectReason::Other {
            message: other.to_string(),
        },
    };
    PushRejection {
        target,
        hint: rejection_hint(&reason),
        reason,
    }
}
