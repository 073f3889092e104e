//! Caller location for relative trait references.
//!
//! When `with_trait`/`extend` receives a string that is not a registered
//! name, the reference is resolved relative to the source file of the code
//! that invoked the builder. The builder methods are `#[track_caller]`, so
//! `std::panic::Location` hands us that file without any engine-specific
//! stack introspection. A location with no parent directory is the failure
//! sentinel.

use std::path::Path;

use log::debug;

use crate::define::namespace::{Namespace, ResolvedModule};
use crate::ds::error::ClaspError;

/// Directory of the invoking source file, or `None` when the location does
/// not expose one (empty or bare file names).
pub fn caller_dir(caller_file: &str) -> Option<String> {
    if caller_file.is_empty() {
        return None;
    }
    let parent = Path::new(caller_file).parent()?;
    let dir = parent.to_str()?;
    if dir.is_empty() {
        None
    } else {
        Some(dir.to_string())
    }
}

/// Joins a directory and a relative reference, collapsing duplicate
/// separators.
pub fn join_normalized(dir: &str, relative: &str) -> String {
    let mut joined = format!("{}/{}", dir, relative);
    while joined.contains("//") {
        joined = joined.replace("//", "/");
    }
    joined
}

/// Resolves a caller-relative reference through the namespace's resolver
/// chain.
pub fn resolve_relative(
    caller_file: &str,
    relative: &str,
    namespace: &Namespace,
) -> Result<ResolvedModule, ClaspError> {
    let dir = caller_dir(caller_file).ok_or_else(|| {
        ClaspError::Resolution(format!(
            "caller location for '{}' is not determinable",
            relative
        ))
    })?;
    let path = join_normalized(&dir, relative);
    debug!("resolving trait reference '{}' as '{}'", relative, path);
    namespace.resolve_path(&path).ok_or_else(|| {
        ClaspError::Resolution(format!("no module resolver matched '{}'", path))
    })
}
