//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. The engine sees the
//! repository through the [`RefStore`] trait; [`Git`] implements it for real
//! repositories and [`mock::MockRefStore`] in memory. No other module
//! imports `git2`.
//!
//! # Invariants
//!
//! - Branch pointer moves outside the checked-out branch use CAS
//! - Network access happens only in fetch, ls-remote and push operations
//! - All operations return strong types (Oid, BranchName, TagName, RefName)

mod interface;
pub mod mock;
mod store;

pub use interface::{Git, GitError};
pub use store::{
    CommitSummary, PushMode, RefStore, RejectReason, TagRef, Upstream, WorktreeStatus,
};
