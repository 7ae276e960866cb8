//! refsync - keep local branches and tags in step with a git remote
//!
//! refsync runs two operations against one remote:
//!
//! - `sync` fetches, creates tracking branches for new remote branches,
//!   fast-forwards every branch that is strictly behind, refreshes tags and
//!   prunes stale remote-tracking refs
//! - `push` publishes only what is strictly ahead of the remote, gated on a
//!   clean tree and an explicit confirmation
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The reconciler and publisher, and their reports
//! - [`core`] - Strong types and configuration
//! - [`git`] - The [`git::RefStore`] seam, its real and in-memory implementations
//! - [`ui`] - Prompts, narration and report rendering
//!
//! # Correctness Invariants
//!
//! 1. A branch is only ever moved forward, never across a divergence
//! 2. Declining a confirmation leaves the repository untouched
//! 3. Nothing is pushed unless it is strictly ahead of the remote

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
