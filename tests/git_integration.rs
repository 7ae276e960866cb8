//! Integration tests for the Git store.
//!
//! These tests use real git repositories created via tempfile: a bare
//! repository plays the remote, `local` is the clone under test and
//! `other` is a second clone used to change the remote behind its back.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use refsync::core::types::{BranchName, Oid, TagName};
use refsync::git::{Git, GitError, PushMode, RefStore, RejectReason, Upstream};

// =============================================================================
// Test Fixtures
// =============================================================================

/// A bare remote with two clones.
struct Remote {
    _bare: TempDir,
    local: TempDir,
    other: TempDir,
}

impl Remote {
    /// Create a remote whose `main` has one commit, cloned twice.
    fn new() -> Self {
        let bare = TempDir::new().expect("failed to create remote temp dir");
        run_git(bare.path(), &["init", "--bare", "-b", "main"]);

        let local = TempDir::new().expect("failed to create local temp dir");
        init_clone_identity(local.path(), &["init", "-b", "main"]);
        std::fs::write(local.path().join("README.md"), "# Test\n").unwrap();
        run_git(local.path(), &["add", "README.md"]);
        run_git(local.path(), &["commit", "-m", "Initial commit"]);
        run_git(
            local.path(),
            &["remote", "add", "origin", bare.path().to_str().unwrap()],
        );
        run_git(local.path(), &["push", "-u", "origin", "main"]);

        let other = TempDir::new().expect("failed to create other temp dir");
        init_clone_identity(
            other.path(),
            &["clone", bare.path().to_str().unwrap(), "."],
        );

        Self {
            _bare: bare,
            local,
            other,
        }
    }

    fn git(&self) -> Git {
        Git::open(self.local.path()).expect("failed to open local clone")
    }

    /// Commit a file in `dir` and return the new HEAD.
    fn commit_in(dir: &Path, file: &str, message: &str) -> Oid {
        std::fs::write(dir.join(file), message).unwrap();
        run_git(dir, &["add", file]);
        run_git(dir, &["commit", "-m", message]);
        Oid::new(git_output(dir, &["rev-parse", "HEAD"])).unwrap()
    }

    /// Push new work to `branch` from the other clone.
    fn remote_commit(&self, branch: &str, file: &str) -> Oid {
        let dir = self.other.path();
        run_git(dir, &["fetch", "origin"]);
        let exists = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("origin/{branch}")])
            .current_dir(dir)
            .status()
            .unwrap()
            .success();
        if exists {
            run_git(dir, &["checkout", "-B", branch, &format!("origin/{branch}")]);
        } else {
            run_git(dir, &["checkout", "-B", branch, "origin/main"]);
        }
        let oid = Self::commit_in(dir, file, &format!("remote {file}"));
        run_git(dir, &["push", "origin", &format!("{branch}:{branch}")]);
        oid
    }
}

fn init_clone_identity(dir: &Path, first: &[&str]) {
    run_git(dir, first);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn b(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

// =============================================================================
// Opening
// =============================================================================

mod open {
    use super::*;

    #[test]
    fn not_a_repository() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Git::open(dir.path()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn discovers_from_subdirectory() {
        let remote = Remote::new();
        let sub = remote.local.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        let git = Git::open(&sub).unwrap();
        assert_eq!(git.current_branch().unwrap(), Some(b("main")));
    }

    #[test]
    fn default_remote_prefers_origin() {
        let remote = Remote::new();
        run_git(remote.local.path(), &["remote", "add", "aaa", "/nonexistent"]);
        assert_eq!(remote.git().default_remote().unwrap().as_deref(), Some("origin"));
    }

    #[test]
    fn no_remotes() {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "-b", "main"]);
        let git = Git::open(dir.path()).unwrap();
        assert_eq!(git.default_remote().unwrap(), None);
        assert_eq!(git.current_branch().unwrap(), None);
        assert_eq!(git.unborn_branch().unwrap(), Some(b("main")));
    }

    #[test]
    fn detached_head_is_not_unborn() {
        let remote = Remote::new();
        run_git(remote.local.path(), &["checkout", "--detach"]);
        let git = remote.git();
        assert_eq!(git.current_branch().unwrap(), None);
        assert_eq!(git.unborn_branch().unwrap(), None);
    }
}

// =============================================================================
// Queries
// =============================================================================

mod queries {
    use super::*;

    #[test]
    fn upstream_and_tracking_tip() {
        let remote = Remote::new();
        let git = remote.git();

        let upstream = git.upstream_of(&b("main")).unwrap().unwrap();
        assert_eq!(upstream, Upstream::new("origin", b("main")));
        assert_eq!(
            git.tracking_tip(&upstream).unwrap(),
            git.branch_tip(&b("main")).unwrap()
        );
    }

    #[test]
    fn worktree_status_counts() {
        let remote = Remote::new();
        let dir = remote.local.path();
        std::fs::write(dir.join("README.md"), "changed\n").unwrap();
        std::fs::write(dir.join("staged.txt"), "s\n").unwrap();
        run_git(dir, &["add", "staged.txt"]);
        std::fs::write(dir.join("new.txt"), "n\n").unwrap();

        let status = remote.git().worktree_status().unwrap();
        assert_eq!(status.staged, 1);
        assert_eq!(status.unstaged, 1);
        assert_eq!(status.untracked, 1);
        assert!(!status.is_clean());
    }

    #[test]
    fn ahead_and_ancestry() {
        let remote = Remote::new();
        let base = remote.git().branch_tip(&b("main")).unwrap().unwrap();
        let c1 = Remote::commit_in(remote.local.path(), "a.txt", "one");
        let c2 = Remote::commit_in(remote.local.path(), "b.txt", "two");

        let git = remote.git();
        assert!(git.is_ancestor(&base, &c2).unwrap());
        assert!(!git.is_ancestor(&c2, &c1).unwrap());
        assert_eq!(git.ahead_count(&base, &c2).unwrap(), 2);
        assert_eq!(git.ahead_count(&c2, &base).unwrap(), 0);

        let latest = git.latest_commit().unwrap().unwrap();
        assert_eq!(latest.oid, c2);
        assert_eq!(latest.summary, "two");
    }

    #[test]
    fn identity_from_config() {
        let remote = Remote::new();
        assert_eq!(remote.git().identity().unwrap(), "Test User");
    }
}

// =============================================================================
// Fetch and branch updates
// =============================================================================

mod fetching {
    use super::*;

    #[test]
    fn fetch_then_fast_forward_current() {
        let remote = Remote::new();
        let new_tip = remote.remote_commit("main", "remote.txt");
        let git = remote.git();

        git.fetch(true).unwrap();
        let upstream = git.upstream_of(&b("main")).unwrap().unwrap();
        assert_eq!(git.tracking_tip(&upstream).unwrap(), Some(new_tip.clone()));

        assert_eq!(git.fast_forward_current().unwrap(), new_tip);
        assert_eq!(git.branch_tip(&b("main")).unwrap(), Some(new_tip));
        assert!(remote.local.path().join("remote.txt").exists());
    }

    #[test]
    fn fast_forward_refused_when_diverged() {
        let remote = Remote::new();
        remote.remote_commit("main", "remote.txt");
        Remote::commit_in(remote.local.path(), "local.txt", "local");
        let git = remote.git();
        git.fetch(true).unwrap();

        assert!(matches!(
            git.fast_forward_current(),
            Err(GitError::NotFastForward { .. })
        ));
    }

    #[test]
    fn unreachable_remote() {
        let remote = Remote::new();
        let git = remote.git().with_remote("nowhere");
        assert!(matches!(
            git.fetch(true),
            Err(GitError::RemoteUnreachable { .. })
        ));
    }

    #[test]
    fn create_tracking_branch_for_new_remote_branch() {
        let remote = Remote::new();
        let tip = remote.remote_commit("feature-y", "y.txt");
        let git = remote.git();
        git.fetch(true).unwrap();

        assert!(git.remote_branches().unwrap().contains(&b("feature-y")));
        assert!(!git.local_branches().unwrap().contains(&b("feature-y")));

        let upstream = Upstream::new("origin", b("feature-y"));
        assert_eq!(git.create_tracking_branch(&b("feature-y"), &upstream).unwrap(), tip);
        assert_eq!(git.branch_tip(&b("feature-y")).unwrap(), Some(tip));
        assert_eq!(git.upstream_of(&b("feature-y")).unwrap(), Some(upstream.clone()));

        assert!(matches!(
            git.create_tracking_branch(&b("feature-y"), &upstream),
            Err(GitError::BranchExists { .. })
        ));
    }

    #[test]
    fn move_branch_pointer_without_checkout() {
        let remote = Remote::new();
        let base = remote.git().branch_tip(&b("main")).unwrap().unwrap();
        run_git(remote.local.path(), &["branch", "dev"]);
        let tip = Remote::commit_in(remote.local.path(), "x.txt", "x");
        let git = remote.git();

        // Wrong expectation leaves the ref alone
        assert!(matches!(
            git.move_branch_pointer(&b("dev"), &tip, &tip),
            Err(GitError::CasFailed { .. })
        ));
        git.move_branch_pointer(&b("dev"), &tip, &base).unwrap();
        assert_eq!(git.branch_tip(&b("dev")).unwrap(), Some(tip.clone()));

        assert!(matches!(
            git.move_branch_pointer(&b("main"), &base, &tip),
            Err(GitError::BranchCheckedOut { .. })
        ));
    }

    #[test]
    fn stale_refs_listed_then_pruned() {
        let remote = Remote::new();
        remote.remote_commit("old", "old.txt");
        let git = remote.git();
        git.fetch(false).unwrap();

        run_git(remote.other.path(), &["push", "origin", "--delete", "old"]);

        let stale = git.stale_remote_refs().unwrap();
        assert_eq!(
            stale.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            vec!["refs/remotes/origin/old"]
        );
        assert_eq!(git.prune_remote_refs().unwrap(), stale);
        assert!(!git.remote_branches().unwrap().contains(&b("old")));
    }
}

// =============================================================================
// Tags
// =============================================================================

mod tags {
    use super::*;

    #[test]
    fn push_list_and_fetch() {
        let remote = Remote::new();
        let git = remote.git();
        let head = git.branch_tip(&b("main")).unwrap().unwrap();
        run_git(remote.local.path(), &["tag", "v1"]);
        run_git(remote.local.path(), &["tag", "-a", "v2", "-m", "annotated"]);

        let tags = git.tags().unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.target == head));

        git.push_tags(&[TagName::new("v1").unwrap(), TagName::new("v2").unwrap()])
            .unwrap();

        // Annotated tags resolve to the commit, not the tag object
        let remote_tags = git.remote_tags().unwrap();
        assert_eq!(remote_tags.len(), 2);
        assert!(remote_tags.iter().all(|t| t.target == head));

        run_git(remote.other.path(), &["tag", "v3"]);
        run_git(remote.other.path(), &["push", "origin", "v3"]);
        git.fetch_tags(true).unwrap();
        assert!(git
            .tags()
            .unwrap()
            .iter()
            .any(|t| t.name.as_str() == "v3"));
        assert_eq!(git.latest_tags(5).unwrap().len(), 3);
    }

    #[test]
    fn conflicting_tag_fetch_fails() {
        let remote = Remote::new();
        run_git(remote.other.path(), &["tag", "v1"]);
        run_git(remote.other.path(), &["push", "origin", "v1"]);

        Remote::commit_in(remote.local.path(), "l.txt", "local");
        run_git(remote.local.path(), &["tag", "v1"]);

        assert!(remote.git().fetch_tags(false).is_err());
    }
}

// =============================================================================
// Publishing
// =============================================================================

mod publishing {
    use super::*;

    #[test]
    fn set_upstream_push() {
        let remote = Remote::new();
        run_git(remote.local.path(), &["checkout", "-b", "topic"]);
        Remote::commit_in(remote.local.path(), "t.txt", "topic");
        let git = remote.git();

        assert_eq!(git.upstream_of(&b("topic")).unwrap(), None);
        git.push_branch(&b("topic"), PushMode::set_upstream()).unwrap();
        assert_eq!(
            git.upstream_of(&b("topic")).unwrap(),
            Some(Upstream::new("origin", b("topic")))
        );
    }

    #[test]
    fn non_fast_forward_is_classified() {
        let remote = Remote::new();
        remote.remote_commit("main", "remote.txt");
        Remote::commit_in(remote.local.path(), "local.txt", "local");

        match remote.git().push_branch(&b("main"), PushMode::normal()) {
            Err(GitError::PushRejected { target, reason, .. }) => {
                assert_eq!(target, "main");
                assert_eq!(reason, RejectReason::NonFastForward);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn force_with_lease_after_fetch() {
        let remote = Remote::new();
        let theirs = remote.remote_commit("main", "remote.txt");
        let mine = Remote::commit_in(remote.local.path(), "local.txt", "local");
        let git = remote.git();

        git.fetch(true).unwrap();
        git.push_branch(&b("main"), PushMode::force_with_lease(false))
            .unwrap();

        let on_remote = git_output(remote.other.path(), &["ls-remote", "origin", "refs/heads/main"]);
        assert!(on_remote.starts_with(mine.as_str()));
        assert!(!on_remote.starts_with(theirs.as_str()));
    }

    #[test]
    fn commit_all_includes_untracked() {
        let remote = Remote::new();
        std::fs::write(remote.local.path().join("new.txt"), "n\n").unwrap();
        let git = remote.git();

        let oid = git.commit_all("auto").unwrap().unwrap();
        assert_eq!(git.branch_tip(&b("main")).unwrap(), Some(oid));
        assert!(git.worktree_status().unwrap().is_clean());
        assert_eq!(git.commit_all("again").unwrap(), None);
    }

    #[test]
    fn undo_then_recommit_keeps_content() {
        let remote = Remote::new();
        let base = remote.git().branch_tip(&b("main")).unwrap().unwrap();
        Remote::commit_in(remote.local.path(), "big.bin", "add data");
        let git = remote.git();

        let message = git.undo_last_commit().unwrap();
        assert_eq!(message.trim_end(), "add data");
        assert_eq!(git.branch_tip(&b("main")).unwrap(), Some(base.clone()));
        assert_eq!(git.worktree_status().unwrap().staged, 1);

        let oid = git.commit_staged("add data\n\n[LFS Added]").unwrap();
        assert_eq!(git.branch_tip(&b("main")).unwrap(), Some(oid.clone()));
        assert_eq!(git.ahead_count(&base, &oid).unwrap(), 1);
        assert!(git.worktree_status().unwrap().is_clean());
        assert!(remote.local.path().join("big.bin").exists());
    }

    #[test]
    fn undo_refuses_root_commit() {
        let dir = TempDir::new().unwrap();
        init_clone_identity(dir.path(), &["init", "-b", "main"]);
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        run_git(dir.path(), &["add", "a.txt"]);
        run_git(dir.path(), &["commit", "-m", "root"]);

        let git = Git::open(dir.path()).unwrap();
        assert!(git.undo_last_commit().is_err());
        assert!(git.current_branch().unwrap().is_some());
    }
}
