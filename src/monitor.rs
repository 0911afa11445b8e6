// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Change detection for the watched directory
//!
//! Top-level entries move through Discovered, Stable and Processed. An
//! entry is Stable once its snapshot stayed identical over enough successive
//! polls; only Stable entries are handed out for organizing.

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::signature::Snapshot;
use crate::Result;

/// Names the operating system leaves lying around
const CLUTTER: [&str; 3] = ["desktop.ini", "thumbs.db", ".ds_store"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovered,
    Stable,
    Processed,
}

/// An entry ready to be organized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

#[derive(Debug)]
struct Tracked {
    snapshot: Snapshot,
    /// Successive polls that saw `snapshot` unchanged, the first sighting included
    unchanged: u32,
    phase: Phase,
}

pub struct ChangeDetector {
    root: PathBuf,
    protected: Vec<String>,
    ignore: Vec<Pattern>,
    stable_polls: u32,
    entries: HashMap<PathBuf, Tracked>,
}

impl ChangeDetector {
    /// Detector for the top level of `root`. Entries named in `protected`
    /// (the library roots) are never tracked.
    pub fn new(root: &Path, protected: Vec<String>, config: &MonitorConfig) -> Result<Self> {
        let ignore = config
            .ignore
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            protected,
            ignore,
            stable_polls: config.stable_polls.max(1),
            entries: HashMap::new(),
        })
    }

    /// Whether a top-level name may ever be organized
    pub fn is_candidate(&self, name: &str) -> bool {
        if self.protected.iter().any(|p| p == name) {
            return false;
        }

        // Hidden files, including our own partial copies
        if name.starts_with('.') {
            return false;
        }

        if CLUTTER.iter().any(|n| name.eq_ignore_ascii_case(n)) {
            return false;
        }

        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        !self.ignore.iter().any(|p| p.matches_with(name, options))
    }

    /// List the watched directory once and advance every entry's phase.
    /// Returns all entries currently Stable.
    pub fn poll(&mut self) -> Result<Vec<StableEntry>> {
        let mut seen = HashSet::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", self.root, e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.is_candidate(&name) {
                continue;
            }

            let path = entry.path();
            // Gone between listing and probing
            let Ok(snapshot) = Snapshot::of(&path) else {
                continue;
            };
            self.observe(&path, snapshot);
            seen.insert(path);
        }

        // Whatever disappeared is no longer tracked
        self.entries.retain(|path, _| seen.contains(path));

        let mut stable: Vec<StableEntry> = self
            .entries
            .iter()
            .filter(|(_, t)| t.phase == Phase::Stable)
            .map(|(path, t)| StableEntry {
                path: path.clone(),
                kind: if t.snapshot.is_folder() { EntryKind::Folder } else { EntryKind::File },
            })
            .collect();
        stable.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(stable)
    }

    fn observe(&mut self, path: &Path, snapshot: Snapshot) {
        match self.entries.get_mut(path) {
            None => {
                debug!("Discovered {:?}", path);
                let phase = if self.stable_polls <= 1 { Phase::Stable } else { Phase::Discovered };
                self.entries.insert(
                    path.to_path_buf(),
                    Tracked {
                        snapshot,
                        unchanged: 1,
                        phase,
                    },
                );
            }
            Some(tracked) if tracked.phase == Phase::Processed => {}
            Some(tracked) => {
                if tracked.snapshot == snapshot {
                    tracked.unchanged = tracked.unchanged.saturating_add(1);
                } else {
                    tracked.snapshot = snapshot;
                    tracked.unchanged = 1;
                    tracked.phase = Phase::Discovered;
                }
                if tracked.phase == Phase::Discovered && tracked.unchanged >= self.stable_polls {
                    debug!("{:?} is stable", path);
                    tracked.phase = Phase::Stable;
                }
            }
        }
    }

    /// The entry was organized or deliberately left alone. A path that no
    /// longer exists is forgotten right away, so a new download with the
    /// same name starts over.
    pub fn mark_processed(&mut self, path: &Path) {
        if std::fs::symlink_metadata(path).is_err() {
            self.entries.remove(path);
        } else if let Some(tracked) = self.entries.get_mut(path) {
            tracked.phase = Phase::Processed;
        }
    }

    /// Send the entry back to Discovered so a later cycle tries again
    pub fn mark_retry(&mut self, path: &Path) {
        if let Some(tracked) = self.entries.get_mut(path) {
            tracked.phase = Phase::Discovered;
            tracked.unchanged = 1;
        }
    }

    /// Record the files already present as Processed. Folders are left to
    /// go through the normal phases.
    pub fn seed_existing_files(&mut self) -> Result<usize> {
        let mut seeded = 0;
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.is_candidate(&name) {
                continue;
            }
            let path = entry.path();
            match Snapshot::of(&path) {
                Ok(snapshot) if !snapshot.is_folder() => {
                    self.entries.insert(
                        path,
                        Tracked {
                            snapshot,
                            unchanged: 1,
                            phase: Phase::Processed,
                        },
                    );
                    seeded += 1;
                }
                _ => {}
            }
        }
        Ok(seeded)
    }

    /// Tracked entries not yet Processed
    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|t| t.phase != Phase::Processed)
            .count()
    }

    /// Entries seen but still changing
    pub fn unsettled(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|(_, t)| t.phase == Phase::Discovered)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn phase(&self, path: &Path) -> Option<Phase> {
        self.entries.get(path).map(|t| t.phase)
    }
}

/// A cancellable periodic task: ticks every `period` until the shutdown
/// channel carries `true`.
pub struct PeriodicTask {
    ticker: Interval,
    shutdown: watch::Receiver<bool>,
    /// False once every sender is gone and nobody can cancel any more
    listening: bool,
}

impl PeriodicTask {
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            shutdown,
            listening: true,
        }
    }

    /// Wait for the next tick. Returns false, without waiting for the tick,
    /// once shutdown was signalled.
    pub async fn tick(&mut self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            tokio::select! {
                _ = self.ticker.tick() => return !self.is_cancelled(),
                changed = self.shutdown.changed(), if self.listening => {
                    if changed.is_err() {
                        self.listening = false;
                    }
                }
            }
        }
    }

    /// Cooperative checkpoint between entries
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown is signalled. Pending forever when every
    /// sender is gone without signalling.
    pub async fn cancelled(&self) {
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow_and_update() {
                return;
            }
            if shutdown.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detector(dir: &TempDir) -> ChangeDetector {
        ChangeDetector::new(
            dir.path(),
            vec!["AI Library".to_string(), "Manual Library".to_string()],
            &MonitorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_candidates() {
        let dir = TempDir::new().unwrap();
        let detector = detector(&dir);

        assert!(detector.is_candidate("report.pdf"));
        assert!(detector.is_candidate("Old Project"));
        assert!(!detector.is_candidate("AI Library"));
        assert!(!detector.is_candidate("Manual Library"));
        assert!(!detector.is_candidate(".hidden"));
        assert!(!detector.is_candidate("Thumbs.db"));
        assert!(!detector.is_candidate("movie.mkv.part"));
        assert!(!detector.is_candidate("setup.CRDOWNLOAD"));
        assert!(!detector.is_candidate(".report.pdf.aifiles-partial"));
    }

    #[test]
    fn test_stable_after_two_identical_polls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Buy milk").unwrap();
        let mut detector = detector(&dir);

        assert!(detector.poll().unwrap().is_empty());
        assert_eq!(detector.phase(&path), Some(Phase::Discovered));

        let stable = detector.poll().unwrap();
        assert_eq!(
            stable,
            vec![StableEntry {
                path: path.clone(),
                kind: EntryKind::File
            }]
        );
    }

    #[test]
    fn test_growing_file_is_not_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video.mp4");
        std::fs::write(&path, "chunk").unwrap();
        let mut detector = detector(&dir);

        detector.poll().unwrap();
        std::fs::write(&path, "chunk chunk").unwrap();
        assert!(detector.poll().unwrap().is_empty());
        assert_eq!(detector.phase(&path), Some(Phase::Discovered));
        assert_eq!(detector.unsettled(), vec![path.clone()]);

        assert_eq!(detector.poll().unwrap().len(), 1);
        assert!(detector.unsettled().is_empty());
    }

    #[test]
    fn test_folder_with_growing_nested_file_is_not_stable() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("Unpacking");
        std::fs::create_dir_all(folder.join("inner")).unwrap();
        let nested = folder.join("inner").join("big.bin");
        std::fs::write(&nested, vec![0u8; 10]).unwrap();
        let mut detector = detector(&dir);

        detector.poll().unwrap();
        std::fs::write(&nested, vec![0u8; 100_000]).unwrap();
        assert!(detector.poll().unwrap().is_empty());
        assert_eq!(detector.phase(&folder), Some(Phase::Discovered));

        let stable = detector.poll().unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].kind, EntryKind::Folder);
    }

    #[test]
    fn test_library_roots_never_tracked() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("AI Library")).unwrap();
        std::fs::create_dir(dir.path().join("Manual Library")).unwrap();
        std::fs::create_dir(dir.path().join("Old Project")).unwrap();
        let mut detector = detector(&dir);

        detector.poll().unwrap();
        let stable = detector.poll().unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].kind, EntryKind::Folder);
        assert!(detector.phase(&dir.path().join("AI Library")).is_none());
    }

    #[test]
    fn test_processed_entries_are_not_returned() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("kept.txt");
        let moved = dir.path().join("moved.txt");
        std::fs::write(&kept, "a").unwrap();
        std::fs::write(&moved, "b").unwrap();
        let mut detector = detector(&dir);
        detector.poll().unwrap();
        assert_eq!(detector.poll().unwrap().len(), 2);

        detector.mark_processed(&kept);
        std::fs::remove_file(&moved).unwrap();
        detector.mark_processed(&moved);

        assert!(detector.poll().unwrap().is_empty());
        assert_eq!(detector.phase(&kept), Some(Phase::Processed));
        assert_eq!(detector.phase(&moved), None);
        assert_eq!(detector.pending(), 0);
    }

    #[test]
    fn test_retry_goes_back_to_discovered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "a").unwrap();
        let mut detector = detector(&dir);
        detector.poll().unwrap();
        detector.poll().unwrap();

        detector.mark_retry(&path);
        assert_eq!(detector.phase(&path), Some(Phase::Discovered));
        assert_eq!(detector.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_seed_existing_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.txt"), "old").unwrap();
        std::fs::create_dir(dir.path().join("Old Project")).unwrap();
        let mut detector = detector(&dir);

        assert_eq!(detector.seed_existing_files().unwrap(), 1);
        detector.poll().unwrap();
        let stable = detector.poll().unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].path, dir.path().join("Old Project"));
    }

    #[test]
    fn test_bad_ignore_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig {
            ignore: vec!["[".to_string()],
            ..MonitorConfig::default()
        };
        assert!(ChangeDetector::new(dir.path(), Vec::new(), &config).is_err());
    }

    #[tokio::test]
    async fn test_periodic_task_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let mut task = PeriodicTask::new(Duration::from_millis(10), rx);

        assert!(task.tick().await);
        assert!(task.tick().await);

        tx.send(true).unwrap();
        assert!(task.is_cancelled());
        assert!(!task.tick().await);
    }

    #[tokio::test]
    async fn test_periodic_task_wakes_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let mut task = PeriodicTask::new(Duration::from_secs(3600), rx);
        assert!(task.tick().await);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        let ticked = tokio::time::timeout(Duration::from_secs(5), task.tick())
            .await
            .unwrap();
        assert!(!ticked);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let task = PeriodicTask::new(Duration::from_secs(3600), rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        });

        tokio::time::timeout(Duration::from_secs(5), task.cancelled())
            .await
            .unwrap();
        assert!(task.is_cancelled());
        stopper.await.unwrap();
    }
}
