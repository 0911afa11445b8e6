// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Conflict resolver: a destination path nothing occupies yet

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{OrganizerError, Result};

/// Suffixes tried before giving up
pub const MAX_SUFFIX: u32 = 10_000;

/// `folder/stem.ext`, or the first free `folder/stem_N.ext` for N = 1, 2, ...
///
/// `extension` may be empty (no dot is added). Fails with `MoveCollision`
/// once `MAX_SUFFIX` candidates are all taken.
pub fn resolve(folder: &Path, stem: &str, extension: &str) -> Result<PathBuf> {
    resolve_reserved(folder, stem, extension, &HashSet::new())
}

/// Like `resolve`, also treating `reserved` paths as taken. Dry runs use
/// this to plan several moves into the same folder.
pub fn resolve_reserved(
    folder: &Path,
    stem: &str,
    extension: &str,
    reserved: &HashSet<PathBuf>,
) -> Result<PathBuf> {
    for n in 0..=MAX_SUFFIX {
        let path = candidate(folder, stem, extension, n);
        if !occupied(&path) && !reserved.contains(&path) {
            return Ok(path);
        }
    }

    Err(OrganizerError::MoveCollision(candidate(folder, stem, extension, 0)))
}

/// Candidate number `n`; 0 is the unsuffixed name
pub fn candidate(folder: &Path, stem: &str, extension: &str, n: u32) -> PathBuf {
    let stem = if n == 0 {
        stem.to_string()
    } else {
        format!("{}_{}", stem, n)
    };
    if extension.is_empty() {
        folder.join(stem)
    } else {
        folder.join(format!("{}.{}", stem, extension))
    }
}

/// Whether anything sits at `path`. Dangling symlinks count as taken.
pub fn occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
