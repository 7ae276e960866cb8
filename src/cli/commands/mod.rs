//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository through the engine
//! 2. Runs the engine component with a terminal prompt
//! 3. Prints the summary, or the JSON report with `--json`
//!
//! Handlers do NOT perform repository mutations directly.

mod completion;
mod push;
mod sync;

pub use completion::completion;
pub use push::push;
pub use sync::sync;

use crate::cli::args::Command;
use crate::engine::{Context, PushOptions};
use anyhow::Result;
use serde::Serialize;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Sync {
            force,
            quiet,
            no_lfs,
        } => sync::sync(ctx, force, quiet, no_lfs),
        Command::Push {
            default_commit,
            current_only,
            tags_only,
            force,
        } => push::push(
            ctx,
            PushOptions {
                default_commit,
                current_only,
                tags_only,
                force,
            },
        ),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Print a report as pretty JSON on stdout.
fn emit_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
