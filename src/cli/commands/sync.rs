//! cli::commands::sync
//!
//! Bring local branches and tags up to date with the remote.
//!
//! # Example
//!
//! ```bash
//! # Sync with the default remote
//! refsync sync
//!
//! # Skip the dirty-tree prompt
//! refsync sync --force
//!
//! # Machine-readable report
//! refsync sync --json
//! ```

use anyhow::Result;

use crate::engine::{self, Context, Reconciler, SyncOptions};
use crate::ui::output::Verbosity;
use crate::ui::prompts::TerminalPrompt;
use crate::ui::render;

use super::emit_json;

/// Run the sync command.
pub fn sync(ctx: &Context, force: bool, quiet: bool, no_lfs: bool) -> Result<()> {
    let git = engine::open_repository(ctx)?;
    let prompt = TerminalPrompt::new(ctx.config.assume_yes());

    let opts = SyncOptions {
        force,
        quiet,
        lfs: !no_lfs,
    };
    let verbosity = Verbosity::from_flags(ctx.quiet || quiet, ctx.debug);

    let report = Reconciler::new(&git, &prompt, verbosity).sync(&opts)?;

    if ctx.json {
        emit_json(&report)
    } else {
        print!("{}", render::sync_summary(&report));
        Ok(())
    }
}
