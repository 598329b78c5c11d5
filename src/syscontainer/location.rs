// ABOUTME: Resolves a user-supplied path to a container location with a rootfs.
// ABOUTME: Accepts either the container directory or its rootfs directory.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Canonical container location for `input`.
///
/// `input` may name the container directory (it has a `rootfs` child) or the
/// rootfs itself (it is called `rootfs` and has a `usr` child), in which case
/// the parent is returned. Symlinks are always resolved.
pub fn resolve_remote_location(input: &Path) -> Result<PathBuf> {
    let trimmed = trim_trailing_separators(input);
    let canonical = std::fs::canonicalize(&trimmed).map_err(|e| Error::InvalidLocation {
        path: trimmed.clone(),
        reason: format!("cannot resolve path: {}", e),
    })?;

    if canonical.join("rootfs").is_dir() {
        tracing::debug!(location = %canonical.display(), "rootfs found under location");
        return Ok(canonical);
    }

    let named_rootfs = trimmed.file_name().is_some_and(|n| n == "rootfs")
        || canonical.file_name().is_some_and(|n| n == "rootfs");
    if named_rootfs
        && canonical.join("usr").is_dir()
        && let Some(parent) = canonical.parent()
    {
        return Ok(parent.to_path_buf());
    }

    Err(Error::InvalidLocation {
        path: trimmed,
        reason: "the given location does not contain a rootfs".to_string(),
    })
}

fn trim_trailing_separators(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() && !text.is_empty() {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}
