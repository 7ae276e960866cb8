//! cli
//!
//! Command-line interface layer for refsync.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve configuration and install logging
//! - Delegate to command handlers
//! - Does NOT touch the repository directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. All repository reads and writes flow
//! through a [`crate::git::RefStore`].

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::core::config::{Config, ConfigOverrides};
use crate::engine;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    let config = Config::resolve(&ConfigOverrides {
        remote: cli.remote.clone(),
        assume_yes: cli.yes,
    })?;

    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.json,
        json: cli.json,
        config,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr log subscriber. `RUST_LOG` takes precedence.
fn init_logging(debug: bool) {
    let default = if debug { "refsync=debug" } else { "refsync=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
