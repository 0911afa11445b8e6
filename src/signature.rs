// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File identity: content signatures for caching, snapshots for stability

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::Result;

/// Content identity of a file: its length plus a BLAKE3 digest of its
/// leading bytes. Name and timestamps are not part of it: two copies of the
/// same download share one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSignature {
    len: u64,
    head: [u8; 32],
}

impl FileSignature {
    /// Hash up to `prefix_bytes` leading bytes of the file at `path`
    pub fn compute(path: &Path, prefix_bytes: u64) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let mut hasher = blake3::Hasher::new();
        io::copy(&mut file.take(prefix_bytes), &mut hasher)?;

        Ok(Self {
            len,
            head: *hasher.finalize().as_bytes(),
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Short hex form for log lines
    pub fn short_hex(&self) -> String {
        self.head[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Full-content digest, used to verify copies
pub fn content_hash(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Cheap snapshot of a directory entry, compared across polls to decide
/// whether something is still being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    File {
        len: u64,
        modified: Option<SystemTime>,
    },
    /// Totals over the whole tree, so a file growing deep inside still
    /// changes the snapshot
    Folder {
        modified: Option<SystemTime>,
        entries: u64,
        bytes: u64,
    },
}

impl Snapshot {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;

        if meta.is_dir() {
            let mut modified = meta.modified().ok();
            let mut entries = 0;
            let mut bytes = 0;
            for entry in WalkDir::new(path).min_depth(1).into_iter().flatten() {
                entries += 1;
                if let Ok(child) = entry.metadata() {
                    if child.is_file() {
                        bytes += child.len();
                    }
                    modified = modified.max(child.modified().ok());
                }
            }
            Ok(Snapshot::Folder {
                modified,
                entries,
                bytes,
            })
        } else {
            Ok(Snapshot::File {
                len: meta.len(),
                modified: meta.modified().ok(),
            })
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Snapshot::Folder { .. })
    }
}
