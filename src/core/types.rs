//! core::types
//!
//! Strong types for the names and ids refsync passes around.
//!
//! # Types
//!
//! - [`BranchName`] - Validated short branch name (`main`, `feature/x`)
//! - [`TagName`] - Validated short tag name (`v1.2.0`)
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated full reference name (`refs/heads/main`)
//!
//! # Validation
//!
//! These types enforce validity at construction time, so a value that
//! reaches the git layer is always something `git check-ref-format` would
//! accept.
//!
//! # Examples
//!
//! ```
//! use refsync::core::types::{BranchName, Oid, RefName, TagName};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let tag = TagName::new("v1.0.0").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//!
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/feature/my-branch");
//! assert_eq!(RefName::for_tag(&tag).as_str(), "refs/tags/v1.0.0");
//! assert_eq!(oid.short(7), "abc123d");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid tag name: {0}")]
    InvalidTagName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Check a name against git's refname rules.
///
/// Returns a description of the first violated rule. Shared by every
/// name type; each wraps the message in its own error variant.
fn check_ref_rules(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("cannot be empty".into());
    }
    if name == "@" {
        return Err("cannot be '@' (reserved)".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err("cannot start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return Err("cannot end with '.lock'".into());
    }

    for forbidden in ["..", "@{", "//"] {
        if name.contains(forbidden) {
            return Err(format!("cannot contain '{forbidden}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err("cannot contain control characters".into());
    }

    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}

/// Conversions shared by the string newtypes in this module.
macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// A validated short branch name, e.g. `main` or `feature/login`.
///
/// The same name identifies a local branch (`refs/heads/<name>`) and its
/// counterpart on the remote (`refs/remotes/<remote>/<name>`).
///
/// ```
/// use refsync::core::types::BranchName;
///
/// assert_eq!(BranchName::new("feature/x").unwrap().as_str(), "feature/x");
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-flag").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        check_ref_rules(&name)
            .map_err(|rule| TypeError::InvalidBranchName(format!("branch name {rule}")))?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype_impls!(BranchName);

/// A validated short tag name, e.g. `v1.2.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// Create a new validated tag name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('-') {
            return Err(TypeError::InvalidTagName(
                "tag name cannot start with '-'".into(),
            ));
        }
        check_ref_rules(&name)
            .map_err(|rule| TypeError::InvalidTagName(format!("tag name {rule}")))?;
        Ok(Self(name))
    }

    /// Get the tag name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype_impls!(TagName);

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// ```
/// use refsync::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters, or the full OID if shorter.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype_impls!(Oid);

/// A validated full Git reference name.
///
/// ```
/// use refsync::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// assert_eq!(
///     RefName::for_remote_branch("origin", &branch).as_str(),
///     "refs/remotes/origin/feature/foo"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_rules(&name)
            .map_err(|rule| TypeError::InvalidRefName(format!("ref name {rule}")))?;
        Ok(Self(name))
    }

    /// `refs/heads/<branch>`
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// `refs/tags/<tag>`
    pub fn for_tag(tag: &TagName) -> Self {
        Self(format!("refs/tags/{}", tag.as_str()))
    }

    /// `refs/remotes/<remote>/<branch>`
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a local branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Check if this ref is a remote-tracking ref.
    pub fn is_remote_ref(&self) -> bool {
        self.0.starts_with("refs/remotes/")
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype_impls!(RefName);

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("feature/foo").is_ok());
            assert!(BranchName::new("user@feature").is_ok());
            assert!(BranchName::new("with.dot").is_ok());
            assert!(BranchName::new("a/b/c/d").is_ok());
        }

        #[test]
        fn structural_rules() {
            assert!(BranchName::new("").is_err());
            assert!(BranchName::new("@").is_err());
            assert!(BranchName::new(".hidden").is_err());
            assert!(BranchName::new("foo/.hidden").is_err());
            assert!(BranchName::new("-flag").is_err());
            assert!(BranchName::new("branch.lock").is_err());
            assert!(BranchName::new("branch/").is_err());
            assert!(BranchName::new("bad..path").is_err());
            assert!(BranchName::new("foo@{bar").is_err());
            assert!(BranchName::new("foo//bar").is_err());
        }

        #[test]
        fn special_chars_rejected() {
            for name in ["has space", "a~b", "a^b", "a:b", "a\\b", "a?b", "a*b", "a[b"] {
                assert!(BranchName::new(name).is_err(), "{name} accepted");
            }
            assert!(BranchName::new("has\ttab").is_err());
        }

        #[test]
        fn error_names_the_kind() {
            let err = BranchName::new("a..b").unwrap_err();
            assert_eq!(
                err,
                TypeError::InvalidBranchName("branch name cannot contain '..'".into())
            );
        }

        #[test]
        fn serde_roundtrip() {
            let name = BranchName::new("feature/test").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"feature/test\"");
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, parsed);
        }

        #[test]
        fn serde_rejects_invalid() {
            assert!(serde_json::from_str::<BranchName>("\"bad..name\"").is_err());
        }

        #[test]
        fn ordering_is_lexicographic() {
            let mut names = vec![
                BranchName::new("zeta").unwrap(),
                BranchName::new("alpha").unwrap(),
            ];
            names.sort();
            assert_eq!(names[0].as_str(), "alpha");
        }
    }

    mod tag_name {
        use super::*;

        #[test]
        fn versions_are_valid() {
            assert!(TagName::new("v1.0.0").is_ok());
            assert!(TagName::new("release/2024-01").is_ok());
        }

        #[test]
        fn invalid_tags_rejected() {
            assert!(matches!(
                TagName::new("v1..0"),
                Err(TypeError::InvalidTagName(_))
            ));
            assert!(TagName::new("-v1").is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn sha1_and_sha256_lengths() {
            assert!(Oid::new("a".repeat(40)).is_ok());
            assert!(Oid::new("b".repeat(64)).is_ok());
            assert!(Oid::new("c".repeat(39)).is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn normalized_to_lowercase() {
            let oid = Oid::new("ABCDEF".repeat(6) + "ABCD").unwrap();
            assert!(oid.as_str().chars().all(|c| !c.is_ascii_uppercase()));
        }

        #[test]
        fn short_clamps_to_length() {
            let oid = Oid::new("1".repeat(40)).unwrap();
            assert_eq!(oid.short(7), "1111111");
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn constructors() {
            let branch = BranchName::new("main").unwrap();
            let tag = TagName::new("v1").unwrap();
            assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/main");
            assert_eq!(RefName::for_tag(&tag).as_str(), "refs/tags/v1");
            assert_eq!(
                RefName::for_remote_branch("upstream", &branch).as_str(),
                "refs/remotes/upstream/main"
            );
        }

        #[test]
        fn classification() {
            let local = RefName::new("refs/heads/main").unwrap();
            let remote = RefName::new("refs/remotes/origin/main").unwrap();
            assert!(local.is_branch_ref());
            assert!(!local.is_remote_ref());
            assert!(remote.is_remote_ref());
            assert_eq!(remote.strip_prefix("refs/remotes/origin/"), Some("main"));
        }

        #[test]
        fn invalid_rejected() {
            assert!(RefName::new("refs/heads/").is_err());
            assert!(RefName::new("refs/heads/a b").is_err());
        }
    }
}
