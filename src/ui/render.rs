//! ui::render
//!
//! End-of-run summaries for sync and push reports.
//!
//! Rendering is pure: functions return the text and the command layer
//! decides where it goes. Failures are grouped at the end so they are not
//! lost in the step narration.

use std::fmt::Write;

use crate::engine::report::{Outcome, PushReport, SyncReport};

/// Text summary of a sync.
pub fn sync_summary(report: &SyncReport) -> String {
    let mut out = String::new();

    if report.outcome == Outcome::Aborted {
        out.push_str("Sync cancelled; nothing was changed.\n");
        return out;
    }

    if let Some(summary) = &report.summary {
        let _ = writeln!(out, "Repository summary ({}):", report.remote);
        match &summary.current_branch {
            Some(branch) => {
                let _ = writeln!(out, "  current branch:  {branch}");
            }
            None => out.push_str("  current branch:  (detached)\n"),
        }
        let _ = writeln!(out, "  local branches:  {}", summary.local_branches);
        let _ = writeln!(out, "  remote branches: {}", summary.remote_branches);
        let _ = writeln!(out, "  tags:            {}", summary.tags);
        if let Some(commit) = &summary.latest_commit {
            let _ = writeln!(out, "  latest commit:   {commit}");
        }
    }

    let counts = [
        (report.created.len(), "created"),
        (report.updated.len(), "updated"),
        (report.in_sync.len(), "in sync"),
        (report.new_tags.len(), "new tags"),
        (report.pruned.len(), "pruned"),
    ];
    let line: Vec<String> = counts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();
    if line.is_empty() {
        out.push_str("Already up to date.\n");
    } else {
        let _ = writeln!(out, "Branches and tags: {}", line.join(", "));
    }

    if !report.unpublished_tags.is_empty() {
        let names: Vec<String> = report.unpublished_tags.iter().map(|t| t.to_string()).collect();
        let _ = writeln!(
            out,
            "Tags not on {}: {} (publish with `refsync push --tags`)",
            report.remote,
            names.join(", ")
        );
    }

    if report.has_failures() {
        out.push_str("\nNeeds attention:\n");
        for failure in &report.creation_failures {
            let _ = writeln!(out, "  - {}: could not create: {}", failure.branch, failure.message);
        }
        for failure in &report.update_failures {
            let _ = writeln!(out, "  - {}: {}", failure.branch, failure.reason);
        }
        for conflict in &report.tag_conflicts {
            let _ = writeln!(
                out,
                "  - tag {}: local {} differs from remote {}",
                conflict.tag,
                conflict.local.short(7),
                conflict.remote.short(7)
            );
        }
        for err in &report.step_errors {
            let _ = writeln!(out, "  - {} step failed: {}", err.step, err.message);
        }
    }

    let _ = writeln!(out, "Done in {:.1}s.", report.elapsed_ms as f64 / 1000.0);
    out
}

/// Text summary of a push.
pub fn push_summary(report: &PushReport) -> String {
    let mut out = String::new();

    match report.outcome {
        Outcome::Aborted => {
            out.push_str("Push cancelled; nothing was changed.\n");
            return out;
        }
        Outcome::Completed if report.nothing_to_do() && !report.has_failures() => {
            out.push_str("Nothing to push.\n");
            return out;
        }
        Outcome::Completed => {}
    }

    if let Some(oid) = report.auto_commit.as_ref().and_then(|c| c.oid.as_ref()) {
        let _ = writeln!(out, "Committed {}", oid.short(7));
    }
    for rewrite in &report.lfs_rewrites {
        let _ = writeln!(
            out,
            "Moved {} to Git LFS on {} (last commit rewritten as {})",
            rewrite.path,
            rewrite.branch,
            rewrite.commit.short(7)
        );
    }
    if !report.pushed.is_empty() {
        let verb = if report.forced { "Force-pushed" } else { "Pushed" };
        let names: Vec<String> = report.pushed.iter().map(|b| b.to_string()).collect();
        let _ = writeln!(out, "{verb} to {}: {}", report.remote, names.join(", "));
    }
    if !report.tags_pushed.is_empty() {
        let names: Vec<String> = report.tags_pushed.iter().map(|t| t.to_string()).collect();
        let _ = writeln!(out, "Tags pushed: {}", names.join(", "));
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "Note: {warning}");
    }

    if report.has_failures() {
        out.push_str("\nNeeds attention:\n");
        for rejection in &report.rejections {
            let _ = writeln!(out, "  - {}: rejected ({})", rejection.target, rejection.reason);
            if let Some(hint) = &rejection.hint {
                let _ = writeln!(out, "    hint: {hint}");
            }
        }
        for conflict in &report.tag_conflicts {
            let _ = writeln!(
                out,
                "  - tag {}: local {} differs from remote {}; not pushed",
                conflict.tag,
                conflict.local.short(7),
                conflict.remote.short(7)
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BranchName, Oid, TagName};
    use crate::engine::report::{
        BranchUpdateFailure, LfsRewrite, PushCandidate, PushRejection, RepoSummary,
        TagConflict, UpdateFailureReason,
    };
    use crate::git::RejectReason;

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn aborted_sync() {
        let mut report = SyncReport::new("origin");
        report.outcome = Outcome::Aborted;
        assert!(sync_summary(&report).contains("cancelled"));
    }

    #[test]
    fn sync_lists_failures_last() {
        let mut report = SyncReport::new("origin");
        report.summary = Some(RepoSummary {
            current_branch: None,
            local_branches: 2,
            remote_branches: 3,
            tags: 0,
            latest_commit: None,
        });
        report.update_failures.push(BranchUpdateFailure {
            branch: BranchName::new("dev").unwrap(),
            reason: UpdateFailureReason::Diverged {
                ahead: 1,
                behind: 2,
            },
        });

        let text = sync_summary(&report);
        assert!(text.contains("(detached)"));
        assert!(text.contains("remote branches: 3"));
        assert!(text.contains("Already up to date."));
        let attention = text.find("Needs attention").unwrap();
        assert!(text[attention..].contains("dev: diverged"));
    }

    #[test]
    fn push_nothing() {
        assert_eq!(push_summary(&PushReport::new("origin")), "Nothing to push.\n");
    }

    #[test]
    fn push_with_hint_and_conflict() {
        let mut report = PushReport::new("origin");
        report.pushed.push(BranchName::new("main").unwrap());
        report.tags_pushed.push(TagName::new("v1").unwrap());
        report.rejections.push(PushRejection {
            target: "topic".into(),
            reason: RejectReason::LargeFile { path: None },
            hint: Some("track it with Git LFS".into()),
        });
        report.tag_conflicts.push(TagConflict {
            tag: TagName::new("v0").unwrap(),
            local: oid('a'),
            remote: oid('b'),
        });

        let text = push_summary(&report);
        assert!(text.contains("Pushed to origin: main"));
        assert!(text.contains("Tags pushed: v1"));
        assert!(text.contains("hint: track it with Git LFS"));
        assert!(text.contains("tag v0: local aaaaaaa differs from remote bbbbbbb"));
    }

    #[test]
    fn push_lists_lfs_rewrite() {
        let mut report = PushReport::new("origin");
        report.candidates.push(PushCandidate {
            branch: BranchName::new("main").unwrap(),
            ahead: Some(1),
            set_upstream: false,
        });
        report.lfs_rewrites.push(LfsRewrite {
            branch: BranchName::new("main").unwrap(),
            path: "data/big.bin".into(),
            commit: oid('c'),
        });
        report.pushed.push(BranchName::new("main").unwrap());

        let text = push_summary(&report);
        assert!(text.contains("Moved data/big.bin to Git LFS on main (last commit rewritten as ccccccc)"));
        assert!(text.contains("Pushed to origin: main"));
    }

    #[test]
    fn sync_mentions_unpublished_tags() {
        let mut report = SyncReport::new("origin");
        report.unpublished_tags.push(TagName::new("v2.0-local").unwrap());

        let text = sync_summary(&report);
        assert!(text.contains("Tags not on origin: v2.0-local"));
        assert!(!text.contains("Needs attention"));
    }
}
