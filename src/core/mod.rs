//! core
//!
//! Core domain types and configuration for refsync.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, TagName, Oid, RefName
//! - [`config`] - Per-run configuration resolution
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid ref names from reaching git
//! - Configuration is resolved once per run and then immutable

pub mod config;
pub mod types;
