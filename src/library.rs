// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Library manager: the two library roots, category folders, and moves

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::category::Category;
use crate::config::LibraryConfig;
use crate::resolver;
use crate::signature::content_hash;
use crate::{OrganizerError, Result};

/// Suffix of the hidden copy written during a cross-volume move
const PARTIAL_SUFFIX: &str = "aifiles-partial";

pub struct LibraryManager {
    ai_name: String,
    manual_name: String,
    ai_root: PathBuf,
    manual_root: PathBuf,
    /// Category folders this manager had to create
    created: Mutex<BTreeSet<Category>>,
    /// Held for the duration of a move, so snapshots and renames don't interleave
    moving: Mutex<()>,
}

impl LibraryManager {
    /// Library roots under `watch_dir`. Nothing is created yet.
    pub fn open(watch_dir: &Path, config: &LibraryConfig) -> Self {
        Self {
            ai_name: config.ai_library.clone(),
            manual_name: config.manual_library.clone(),
            ai_root: watch_dir.join(&config.ai_library),
            manual_root: watch_dir.join(&config.manual_library),
            created: Mutex::new(BTreeSet::new()),
            moving: Mutex::new(()),
        }
    }

    pub fn ensure_roots(&self) -> Result<()> {
        for root in [&self.ai_root, &self.manual_root] {
            if !root.is_dir() {
                fs::create_dir_all(root)?;
                info!("Created library root {:?}", root);
            }
        }
        Ok(())
    }

    /// Top-level names the change detector must never pick up
    pub fn root_names(&self) -> Vec<String> {
        vec![self.ai_name.clone(), self.manual_name.clone()]
    }

    pub fn category_folder(&self, category: Category) -> PathBuf {
        self.ai_root.join(category.folder_name())
    }

    /// Create the category folder if needed. Never deletes anything.
    pub fn ensure_category_folder(&self, category: Category) -> Result<PathBuf> {
        let folder = self.category_folder(category);
        if !folder.is_dir() {
            fs::create_dir_all(&folder)?;
            info!("Created category folder {:?}", folder);
            self.created
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(category);
        }
        Ok(folder)
    }

    pub fn created_categories(&self) -> Vec<Category> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    /// Created categories since the last call
    pub fn take_created_categories(&self) -> Vec<Category> {
        let mut created = self.created.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *created).into_iter().collect()
    }

    /// Where `path` would land in the AI Library, without touching anything
    pub fn planned_file_destination(
        &self,
        path: &Path,
        category: Category,
        stem: &str,
        reserved: &HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        resolver::resolve_reserved(&self.category_folder(category), stem, &extension_of(path), reserved)
    }

    /// Where the folder at `path` would land in the Manual Library
    pub fn planned_folder_destination(&self, path: &Path, reserved: &HashSet<PathBuf>) -> Result<PathBuf> {
        resolver::resolve_reserved(&self.manual_root, &folder_name_of(path)?, "", reserved)
    }

    /// Move a file to `AI Library/<category>/<stem>.<ext>`, suffixed if taken
    pub fn move_into_ai_library(&self, path: &Path, category: Category, stem: &str) -> Result<PathBuf> {
        let _moving = self.moving.lock().unwrap_or_else(|e| e.into_inner());
        let folder = self.ensure_category_folder(category)?;
        let extension = extension_of(path);

        self.move_resolved(path, || resolver::resolve(&folder, stem, &extension))
    }

    /// Move a folder, unchanged, to `Manual Library/<name>`
    pub fn move_folder_into_manual_library(&self, path: &Path) -> Result<PathBuf> {
        let _moving = self.moving.lock().unwrap_or_else(|e| e.into_inner());
        if !self.manual_root.is_dir() {
            fs::create_dir_all(&self.manual_root)?;
        }
        let name = folder_name_of(path)?;

        self.move_resolved(path, || resolver::resolve(&self.manual_root, &name, ""))
    }

    /// Resolve and move; if the destination appears in between, resolve and
    /// move once more before giving up.
    fn move_resolved(&self, path: &Path, resolve: impl Fn() -> Result<PathBuf>) -> Result<PathBuf> {
        let destination = resolve()?;
        match relocate(path, &destination) {
            Err(OrganizerError::MoveCollision(taken)) => {
                debug!("{:?} was taken before the move, resolving again", taken);
                let destination = resolve()?;
                relocate(path, &destination)?;
                Ok(destination)
            }
            Err(e) => Err(e),
            Ok(()) => Ok(destination),
        }
    }
}

/// Rename `src` to `dest`, copying across volumes when a rename cannot.
/// Refuses to replace anything already at `dest`.
pub fn relocate(src: &Path, dest: &Path) -> Result<()> {
    if resolver::occupied(dest) {
        return Err(OrganizerError::MoveCollision(dest.to_path_buf()));
    }

    match fs::rename(src, dest) {
        Ok(()) => {
            info!("Moved {:?} -> {:?}", src, dest);
            Ok(())
        }
        Err(e) if is_cross_device(&e) => {
            debug!("{:?} and {:?} are on different volumes, copying", src, dest);
            copy_then_replace(src, dest)
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy `src` next to `dest` under a hidden name, verify it, rename it into
/// place, then delete `src`. On any failure before the rename the copy is
/// removed and `src` is left as it was.
pub fn copy_then_replace(src: &Path, dest: &Path) -> Result<()> {
    let partial = partial_path(dest);
    let failure = |reason: String| OrganizerError::CrossVolumeCopyFailure {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        reason,
    };

    let copied = if src.is_dir() {
        copy_tree(src, &partial)
    } else {
        copy_file(src, &partial)
    };
    if let Err(e) = copied {
        discard(&partial);
        return Err(failure(e.to_string()));
    }

    if resolver::occupied(dest) {
        discard(&partial);
        return Err(OrganizerError::MoveCollision(dest.to_path_buf()));
    }
    if let Err(e) = fs::rename(&partial, dest) {
        discard(&partial);
        return Err(failure(e.to_string()));
    }

    let removed = if src.is_dir() {
        fs::remove_dir_all(src)
    } else {
        fs::remove_file(src)
    };
    if let Err(e) = removed {
        warn!("Copied {:?} to {:?} but could not remove the original: {}", src, dest, e);
    }

    info!("Moved {:?} -> {:?} (copied across volumes)", src, dest);
    Ok(())
}

fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    let written = fs::copy(src, dest)?;
    fs::File::open(dest)?.sync_all()?;

    let expected = fs::metadata(src)?.len();
    if written != expected || fs::metadata(dest)?.len() != expected {
        return Err(io::Error::other(format!("copied {} of {} bytes", written, expected)));
    }
    if digest(src)? != digest(dest)? {
        return Err(io::Error::other("copy does not match the original"));
    }
    Ok(())
}

fn digest(path: &Path) -> io::Result<blake3::Hash> {
    content_hash(path).map_err(|e| io::Error::other(e.to_string()))
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    let (want_files, want_bytes) = tree_totals(src)?;
    let (got_files, got_bytes) = tree_totals(dest)?;
    if want_files != got_files || want_bytes != got_bytes {
        return Err(io::Error::other(format!(
            "copied {} files / {} bytes of {} files / {} bytes",
            got_files, got_bytes, want_files, want_bytes
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_link(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

/// Regular files and their total length, symlinks not followed
fn tree_totals(root: &Path) -> io::Result<(u64, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files += 1;
            bytes += entry.metadata()?.len();
        }
    }
    Ok((files, bytes))
}

fn discard(partial: &Path) {
    let result = if partial.is_dir() {
        fs::remove_dir_all(partial)
    } else {
        fs::remove_file(partial)
    };
    if let Err(e) = result {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove partial copy {:?}: {}", partial, e);
        }
    }
}

/// `.<name>.aifiles-partial` beside `dest`
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}", name, PARTIAL_SUFFIX))
}

/// EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
pub fn is_cross_device(e: &io::Error) -> bool {
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18;
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    #[cfg(not(any(unix, windows)))]
    const CROSS_DEVICE: i32 = -1;

    e.raw_os_error() == Some(CROSS_DEVICE)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn folder_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| OrganizerError::Config(format!("{:?} has no folder name", path)))
}
