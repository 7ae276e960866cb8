//! engine
//!
//! The two operations refsync performs against a [`RefStore`]:
//!
//! - [`reconcile::Reconciler`] brings local branches and tags up to date with
//!   the remote (`refsync sync`)
//! - [`publish::Publisher`] pushes what is strictly ahead of the remote
//!   (`refsync push`)
//!
//! # Architecture
//!
//! ```text
//! open_repository -> RefStore -> Reconciler / Publisher -> Report
//!                                     |
//!                                  Confirm
//! ```
//!
//! Both components read the repository only through the store and ask
//! the user only through the injected [`Confirm`](crate::ui::prompts::Confirm)
//! capability. Classification ([`delta`]) always happens after the remote
//! refresh and before any mutation.
//!
//! # Invariants
//!
//! - Declining a confirmation leaves the repository untouched
//! - Diverged branches are never moved
//! - Only the kinds in [`EngineError`] abort a run; everything else is
//!   recorded in the report

pub mod delta;
pub mod publish;
pub mod reconcile;
pub mod report;

pub use publish::{PushOptions, Publisher};
pub use reconcile::{Reconciler, SyncOptions};
pub use report::{Outcome, PushReport, SyncReport};

use std::path::PathBuf;

use crate::core::config::{Config, ConfigError};
use crate::git::{Git, GitError};
use crate::ui::prompts::PromptError;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Print the report as JSON instead of narration.
    pub json: bool,
    /// Resolved configuration.
    pub config: Config,
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No repository at or above the working directory.
    #[error("not a git repository (or any parent): {path}")]
    NotARepository { path: PathBuf },

    /// The remote could not be fetched from.
    #[error("cannot reach remote '{remote}': {message}")]
    RemoteUnreachable { remote: String, message: String },

    /// The working tree has changes and `--default` was not given.
    #[error(
        "working tree has uncommitted changes ({staged} staged, {unstaged} unstaged, {untracked} untracked); commit them or use --default"
    )]
    UncommittedChanges {
        staged: usize,
        unstaged: usize,
        untracked: usize,
    },

    /// A force push needs a current branch.
    #[error("HEAD is detached; check out a branch to force-push")]
    DetachedHead,

    /// A force push on a branch with no commits yet.
    #[error("current branch {branch} has no commits yet; nothing to force-push")]
    UnbornBranch { branch: String },

    /// Reading an answer failed.
    #[error("prompt failed: {0}")]
    Prompt(#[from] PromptError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Git error.
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

impl EngineError {
    /// Lift a fetch failure into the fatal remote error.
    pub(crate) fn from_remote(err: GitError, remote: &str) -> Self {
        match err {
            GitError::RemoteUnreachable { remote, message } => {
                EngineError::RemoteUnreachable { remote, message }
            }
            other => EngineError::RemoteUnreachable {
                remote: remote.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Open the repository containing the working directory, bound to the
/// configured remote.
pub fn open_repository(ctx: &Context) -> Result<Git, EngineError> {
    let cwd = match &ctx.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().map_err(|_| EngineError::NotARepository {
            path: PathBuf::from("."),
        })?,
    };

    let git = Git::open(&cwd).map_err(|err| match err {
        GitError::NotARepo { path } => EngineError::NotARepository { path },
        GitError::BareRepo => EngineError::NotARepository { path: cwd.clone() },
        other => EngineError::Git(other),
    })?;

    let remote = ctx.config.remote_or(git.default_remote()?);
    tracing::debug!(workdir = %git.workdir().display(), %remote, "opened repository");
    Ok(git.with_remote(remote))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod context {
        use super::*;

        #[test]
        fn default_values() {
            let ctx = Context::default();
            assert!(ctx.cwd.is_none());
            assert!(!ctx.debug);
            assert!(!ctx.quiet);
            assert!(!ctx.json);
            assert!(!ctx.config.assume_yes());
        }
    }

    mod engine_error {
        use super::*;

        #[test]
        fn display_formatting() {
            let err = EngineError::UncommittedChanges {
                staged: 1,
                unstaged: 2,
                untracked: 0,
            };
            let text = err.to_string();
            assert!(text.contains("1 staged"));
            assert!(text.contains("--default"));

            assert!(EngineError::DetachedHead.to_string().contains("detached"));

            let unborn = EngineError::UnbornBranch {
                branch: "main".into(),
            };
            assert!(unborn.to_string().contains("main has no commits yet"));
            assert!(!unborn.to_string().contains("detached"));
        }

        #[test]
        fn fetch_errors_become_unreachable() {
            let err = EngineError::from_remote(
                GitError::CommandFailed {
                    command: "git fetch".into(),
                    message: "boom".into(),
                },
                "origin",
            );
            match err {
                EngineError::RemoteUnreachable { remote, message } => {
                    assert_eq!(remote, "origin");
                    assert!(message.contains("boom"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    mod open {
        use super::*;

        #[test]
        fn outside_repository() {
            let dir = tempfile::tempdir().unwrap();
            let ctx = Context {
                cwd: Some(dir.path().to_path_buf()),
                ..Default::default()
            };
            assert!(matches!(
                open_repository(&ctx),
                Err(EngineError::NotARepository { .. })
            ));
        }
    }
}
