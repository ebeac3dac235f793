//! Record and style name validation.
//!
//! Names become file and directory names in the local backend and keys
//! elsewhere, so they must stay a single path component.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path};

/// Validates a record (or style) name.
///
/// Rejects names that are empty, that contain a path separator or NUL byte,
/// that would resolve to something other than one normal path component
/// (`.` and `..`), or that carry surrounding whitespace.
///
/// # Examples
///
/// ```
/// use recordbase_record::validate_name;
/// assert!(validate_name("2024-01-01 Al Ni").is_ok());
/// assert!(validate_name("potential.Al.2019").is_ok());
/// assert!(validate_name("../etc").is_err());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    if name.is_empty() || name.trim() != name || name.contains(['/', '\\', '\0']) {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}
