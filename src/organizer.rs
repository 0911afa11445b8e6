// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The organizer context: classifier, library and change detector wired
//! together, driven either as a single pass or as a monitor loop.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::category::Category;
use crate::classifier::{Classifier, FallbackReason};
use crate::config::AppConfig;
use crate::library::LibraryManager;
use crate::monitor::{ChangeDetector, EntryKind, PeriodicTask, StableEntry};
use crate::notifier::Notifier;
use crate::ollama::InferenceBackend;
use crate::{OrganizerError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct MovedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub category: Category,
    pub cache_hit: bool,
    pub fallback: Option<FallbackReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovedFolder {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A move a dry run would have made
#[derive(Debug, Clone, Serialize)]
pub struct PlannedMove {
    pub kind: EntryKind,
    pub from: PathBuf,
    pub to: PathBuf,
    pub category: Option<Category>,
    pub fallback: Option<FallbackReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportedError {
    pub path: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

/// What a run did, accumulated instead of aborting on the first failure
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub dry_run: bool,
    pub started_at: DateTime<Local>,
    pub moved_files: Vec<MovedFile>,
    pub moved_folders: Vec<MovedFolder>,
    pub planned: Vec<PlannedMove>,
    pub skipped: Vec<SkippedEntry>,
    pub errors: Vec<ReportedError>,
    pub categories_created: Vec<Category>,
    pub cache: CacheStats,
    pub inference_calls: u64,
}

impl Report {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Local::now(),
            moved_files: Vec::new(),
            moved_folders: Vec::new(),
            planned: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            categories_created: Vec::new(),
            cache: CacheStats::default(),
            inference_calls: 0,
        }
    }

    fn record_error(&mut self, path: &Path, err: &OrganizerError) {
        self.errors.push(ReportedError {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn skip(&mut self, path: &Path, reason: &str) {
        self.skipped.push(SkippedEntry {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }

    /// Moves made, or planned in a dry run
    pub fn moves(&self) -> usize {
        self.moved_files.len() + self.moved_folders.len() + self.planned.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.dry_run { "Dry run" } else { "Run" };
        writeln!(f, "{} started {}", title, self.started_at.format("%Y-%m-%d %H:%M:%S"))?;

        for moved in &self.moved_files {
            let note = match (moved.cache_hit, moved.fallback) {
                (_, Some(reason)) => format!(" (fallback: {:?})", reason),
                (true, None) => " (cached)".to_string(),
                (false, None) => String::new(),
            };
            writeln!(f, "  {} -> {} [{}]{}", moved.from.display(), moved.to.display(), moved.category, note)?;
        }
        for moved in &self.moved_folders {
            writeln!(f, "  {} -> {}", moved.from.display(), moved.to.display())?;
        }
        for plan in &self.planned {
            match plan.category {
                Some(category) => writeln!(
                    f,
                    "  would move {} -> {} [{}]",
                    plan.from.display(),
                    plan.to.display(),
                    category
                )?,
                None => writeln!(f, "  would move {} -> {}", plan.from.display(), plan.to.display())?,
            }
        }
        for skipped in &self.skipped {
            writeln!(f, "  skipped {} ({})", skipped.path.display(), skipped.reason)?;
        }
        for err in &self.errors {
            writeln!(f, "  error {} [{}]: {}", err.path.display(), err.kind, err.message)?;
        }

        if !self.categories_created.is_empty() {
            let names: Vec<&str> = self.categories_created.iter().map(|c| c.label()).collect();
            writeln!(f, "New categories: {}", names.join(", "))?;
        }
        writeln!(
            f,
            "Files: {}  Folders: {}  Planned: {}  Skipped: {}  Errors: {}",
            self.moved_files.len(),
            self.moved_folders.len(),
            self.planned.len(),
            self.skipped.len(),
            self.errors.len()
        )?;
        write!(
            f,
            "Cache: {}/{} entries, {} hits, {} misses, {} evictions; {} inference calls",
            self.cache.entries,
            self.cache.capacity,
            self.cache.hits,
            self.cache.misses,
            self.cache.evictions,
            self.inference_calls
        )
    }
}

/// Owns every component for one watched directory
pub struct Organizer {
    config: AppConfig,
    classifier: Classifier,
    library: LibraryManager,
    detector: ChangeDetector,
    notifier: Notifier,
    dry_run: bool,
    report: Report,
    /// Destinations handed out during the current dry-run cycle
    reserved: HashSet<PathBuf>,
}

impl Organizer {
    pub fn new(config: AppConfig, backend: Arc<dyn InferenceBackend>) -> Result<Self> {
        config.validate()?;
        if !config.watch_dir.is_dir() {
            return Err(OrganizerError::Config(format!(
                "Watch directory {:?} does not exist",
                config.watch_dir
            )));
        }

        let cache = Arc::new(ResponseCache::new(config.cache.max_entries));
        let classifier = Classifier::new(&config, backend, cache);
        let library = LibraryManager::open(&config.watch_dir, &config.library);
        let detector = ChangeDetector::new(
            &config.watch_dir,
            library.root_names(),
            &config.monitor,
        )?;
        let notifier = Notifier::new(&config.notifications);

        Ok(Self {
            config,
            classifier,
            library,
            detector,
            notifier,
            dry_run: false,
            report: Report::new(false),
            reserved: HashSet::new(),
        })
    }

    /// Classify and plan, but create and move nothing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn library(&self) -> &LibraryManager {
        &self.library
    }

    /// Organize whatever is stable right now, then return.
    ///
    /// Polls `stable_polls` times, one poll interval apart, so only entries
    /// that stopped changing are touched. At most `max_files` files are
    /// handled; folders are not counted.
    pub async fn organize_once(&mut self, max_files: Option<usize>) -> Result<Report> {
        self.begin()?;

        let mut stable = Vec::new();
        for poll in 0..self.config.monitor.stable_polls.max(1) {
            if poll > 0 {
                tokio::time::sleep(self.config.monitor.poll_interval()).await;
            }
            stable = self.detector.poll()?;
        }

        for path in self.detector.unsettled() {
            self.report.skip(&path, "unstable");
        }

        let mut budget = max_files;
        self.process(stable, &mut budget, None).await;
        Ok(self.finish())
    }

    /// Poll until `shutdown` carries `true`. A move that has started always
    /// completes; no new cycle starts after the signal.
    pub async fn run_monitor(
        &mut self,
        shutdown: watch::Receiver<bool>,
        max_files: Option<usize>,
    ) -> Result<Report> {
        self.begin()?;

        if self.config.monitor.process_existing {
            info!("Organizing files already present in {:?}", self.config.watch_dir);
        } else {
            let seeded = self.detector.seed_existing_files()?;
            info!("Leaving {} existing files in place", seeded);
        }

        info!(
            "Monitoring {:?} every {:?}",
            self.config.watch_dir,
            self.config.monitor.poll_interval()
        );

        let mut task = PeriodicTask::new(self.config.monitor.poll_interval(), shutdown);
        let mut budget = max_files;

        while task.tick().await {
            let stable = match self.detector.poll() {
                Ok(stable) => stable,
                Err(e) => {
                    warn!("Cannot list {:?}: {}", self.config.watch_dir, e);
                    continue;
                }
            };

            if !stable.is_empty() {
                self.process(stable, &mut budget, Some(&task)).await;
            }
            if budget == Some(0) {
                info!("File limit reached, stopping");
                break;
            }
        }

        info!("Monitor stopped");
        Ok(self.finish())
    }

    fn begin(&mut self) -> Result<()> {
        self.report = Report::new(self.dry_run);
        if !self.dry_run {
            self.library.ensure_roots()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Report {
        self.report.categories_created = self.library.take_created_categories();
        self.report.cache = self.classifier.cache().stats();
        self.report.inference_calls = self.classifier.inference_calls();

        info!(
            "Moved {} files and {} folders, {} errors",
            self.report.moved_files.len(),
            self.report.moved_folders.len(),
            self.report.errors.len()
        );
        self.report.clone()
    }

    /// Folders first, then files, one at a time
    async fn process(
        &mut self,
        stable: Vec<StableEntry>,
        budget: &mut Option<usize>,
        task: Option<&PeriodicTask>,
    ) {
        // Dry-run reservations only need to outlive one cycle
        self.reserved.clear();

        let (folders, files): (Vec<_>, Vec<_>) =
            stable.into_iter().partition(|e| e.kind == EntryKind::Folder);

        for entry in folders.into_iter().chain(files) {
            if task.is_some_and(|t| t.is_cancelled()) {
                info!("Shutdown requested, leaving the rest for next time");
                break;
            }

            if std::fs::symlink_metadata(&entry.path).is_err() {
                self.report.skip(&entry.path, "vanished");
                self.detector.mark_processed(&entry.path);
                continue;
            }

            match entry.kind {
                EntryKind::Folder => self.handle_folder(&entry.path).await,
                EntryKind::File => {
                    if *budget == Some(0) {
                        self.report.skip(&entry.path, "file limit reached");
                        continue;
                    }
                    self.handle_file(&entry.path, task).await;
                    if let Some(left) = budget.as_mut() {
                        *left -= 1;
                    }
                }
            }
        }
    }

    async fn handle_file(&mut self, path: &Path, task: Option<&PeriodicTask>) {
        // Inference may be abandoned on shutdown; the move below may not
        let classification = match task {
            Some(task) => tokio::select! {
                classification = self.classifier.classify(path) => classification,
                _ = task.cancelled() => {
                    info!("Shutdown requested while classifying {:?}", path);
                    self.report.skip(path, "shutdown");
                    return;
                }
            },
            None => self.classifier.classify(path).await,
        };
        let result = classification.result();
        let fallback = classification.fallback_reason();

        if self.dry_run {
            match self
                .library
                .planned_file_destination(path, result.category, &result.proposed_name, &self.reserved)
            {
                Ok(to) => {
                    self.reserved.insert(to.clone());
                    self.report.planned.push(PlannedMove {
                        kind: EntryKind::File,
                        from: path.to_path_buf(),
                        to,
                        category: Some(result.category),
                        fallback,
                    });
                }
                Err(e) => self.report.record_error(path, &e),
            }
            self.detector.mark_processed(path);
            return;
        }

        match self
            .library
            .move_into_ai_library(path, result.category, &result.proposed_name)
        {
            Ok(to) => {
                self.notify(path, &to).await;
                self.report.moved_files.push(MovedFile {
                    from: path.to_path_buf(),
                    to,
                    category: result.category,
                    cache_hit: classification.cache_hit(),
                    fallback,
                });
                self.detector.mark_processed(path);
            }
            Err(e) => self.move_failed(path, e),
        }
    }

    async fn handle_folder(&mut self, path: &Path) {
        if self.dry_run {
            match self.library.planned_folder_destination(path, &self.reserved) {
                Ok(to) => {
                    self.reserved.insert(to.clone());
                    self.report.planned.push(PlannedMove {
                        kind: EntryKind::Folder,
                        from: path.to_path_buf(),
                        to,
                        category: None,
                        fallback: None,
                    });
                }
                Err(e) => self.report.record_error(path, &e),
            }
            self.detector.mark_processed(path);
            return;
        }

        match self.library.move_folder_into_manual_library(path) {
            Ok(to) => {
                self.notify(path, &to).await;
                self.report.moved_folders.push(MovedFolder {
                    from: path.to_path_buf(),
                    to,
                });
                self.detector.mark_processed(path);
            }
            Err(e) => self.move_failed(path, e),
        }
    }

    /// A collision leaves the entry for a later cycle; anything else is final
    fn move_failed(&mut self, path: &Path, e: OrganizerError) {
        self.report.record_error(path, &e);
        match e {
            OrganizerError::MoveCollision(_) => {
                warn!("{:?} left in place for now: {}", path, e);
                self.detector.mark_retry(path);
            }
            _ => {
                error!("Failed to move {:?}: {}", path, e);
                self.detector.mark_processed(path);
            }
        }
    }

    async fn notify(&self, from: &Path, to: &Path) {
        if !self.notifier.is_enabled() {
            return;
        }
        let name = from
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let shown = to
            .strip_prefix(&self.config.watch_dir)
            .unwrap_or(to)
            .display()
            .to_string();
        self.notifier.send("Download organized", &format!("{} -> {}", name, shown)).await;
    }
}
