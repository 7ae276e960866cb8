//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`prompts`] - Confirmations behind the [`prompts::Confirm`] capability
//! - [`output`] - Narration and warnings
//! - [`render`] - End-of-run report summaries
//!
//! # Design
//!
//! All output and prompts go through this module so that `--quiet` and
//! `--json` are honoured in one place.

pub mod output;
pub mod prompts;
pub mod render;
