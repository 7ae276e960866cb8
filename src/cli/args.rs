//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--remote <name>`: Remote to sync with (default: the repository's)
//! - `--yes` / `-y`: Answer yes to ordinary confirmations
//! - `--json`: Print the report as JSON
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// refsync - keep local branches and tags in step with a git remote
#[derive(Parser, Debug)]
#[command(name = "refsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if refsync was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Remote to work against [env: REFSYNC_REMOTE]
    #[arg(long, global = true, value_name = "NAME")]
    pub remote: Option<String>,

    /// Answer yes to ordinary confirmations (never to a force push)
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bring local branches and tags up to date with the remote
    #[command(
        name = "sync",
        long_about = "Bring local branches and tags up to date with the remote.\n\n\
            Fetches with pruning, offers to create local tracking branches for \
            remote branches you do not have yet, fast-forwards every branch that \
            is strictly behind its upstream, fetches tags, and prunes stale \
            remote-tracking refs. Diverged branches are reported and never moved.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Start of the day
    refsync sync

    # Unattended, accepting new branches
    refsync sync --yes

    # With uncommitted work in progress
    refsync sync --force

READING THE OUTPUT:
    Branches that could not be updated are listed under 'Needs attention'
    with the reason (diverged, unpushed commits, needs a manual merge)."
    )]
    Sync {
        /// Skip the uncommitted-changes confirmation
        #[arg(short, long)]
        force: bool,

        /// Only print the final summary
        #[arg(short, long)]
        quiet: bool,

        /// Skip the Git LFS hygiene step
        #[arg(long)]
        no_lfs: bool,
    },

    /// Push branches and tags that are ahead of the remote
    #[command(
        name = "push",
        long_about = "Push branches and tags that are ahead of the remote.\n\n\
            A branch is pushed only if it has no upstream yet (it is pushed with \
            --set-upstream) or is strictly ahead of its upstream. Tags missing on \
            the remote are pushed in one batch. Nothing is pushed without \
            confirmation.\n\n\
            Uncommitted changes stop the push unless --default is given, which \
            commits everything with a generated message first.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Push everything that is ahead
    refsync push

    # Commit pending work with a generated message, then push
    refsync push --default

    # Only the current branch
    refsync push --current

    # Only tags
    refsync push --tags

    # Overwrite the remote branch after a rebase (asks you to type 'yes')
    refsync push --force"
    )]
    Push {
        /// Commit all changes with a generated message before pushing
        #[arg(short = 'd', long = "default")]
        default_commit: bool,

        /// Push only the current branch
        #[arg(short = 'c', long = "current")]
        current_only: bool,

        /// Push only tags
        #[arg(short = 't', long = "tags", conflicts_with_all = ["current_only", "force"])]
        tags_only: bool,

        /// Force-push the current branch with lease
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
INSTALLATION:
    # Bash
    refsync completion bash > ~/.local/share/bash-completion/completions/refsync

    # Zsh
    refsync completion zsh > ~/.zfunc/_refsync

    # Fish
    refsync completion fish > ~/.config/fish/completions/refsync.fish

    # PowerShell
    refsync completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["refsync", "sync", "--remote", "upstream", "-y", "--json"])
            .unwrap();
        assert_eq!(cli.remote.as_deref(), Some("upstream"));
        assert!(cli.yes);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Sync {
                force: false,
                quiet: false,
                no_lfs: false
            }
        ));
    }

    #[test]
    fn push_short_flags() {
        let cli = Cli::try_parse_from(["refsync", "push", "-d", "-c"]).unwrap();
        match cli.command {
            Command::Push {
                default_commit,
                current_only,
                tags_only,
                force,
            } => {
                assert!(default_commit && current_only);
                assert!(!tags_only && !force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tags_conflicts_with_current_and_force() {
        assert!(Cli::try_parse_from(["refsync", "push", "-t", "-c"]).is_err());
        assert!(Cli::try_parse_from(["refsync", "push", "-t", "-f"]).is_err());
        assert!(Cli::try_parse_from(["refsync", "push", "-t", "-d"]).is_ok());
    }
}
