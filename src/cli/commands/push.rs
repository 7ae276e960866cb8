//! cli::commands::push
//!
//! Push branches and tags that are ahead of the remote.
//!
//! # Example
//!
//! ```bash
//! # Everything that is ahead
//! refsync push
//!
//! # Commit pending work first
//! refsync push --default
//!
//! # Only the current branch, forced with lease
//! refsync push --force
//! ```

use anyhow::Result;

use crate::engine::{self, Context, Publisher, PushOptions};
use crate::ui::output::Verbosity;
use crate::ui::prompts::TerminalPrompt;
use crate::ui::render;

use super::emit_json;

/// Run the push command.
pub fn push(ctx: &Context, opts: PushOptions) -> Result<()> {
    let git = engine::open_repository(ctx)?;
    let prompt = TerminalPrompt::new(ctx.config.assume_yes());
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let report = Publisher::new(&git, &prompt, verbosity).push(&opts)?;

    if ctx.json {
        emit_json(&report)
    } else {
        print!("{}", render::push_summary(&report));
        Ok(())
    }
}
