// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end runs against a temporary downloads folder

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aifiles::category::Category;
use aifiles::classifier::FallbackReason;
use aifiles::ollama::InferenceBackend;
use aifiles::{AppConfig, Organizer, OrganizerError, Result};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;

/// Answers every prompt with the same reply, or fails when there is none
struct Scripted {
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl Scripted {
    fn replying(reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn offline() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for Scripted {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(reply) => Ok(reply.to_string()),
            None => Err(OrganizerError::InferenceUnavailable(
                "connection refused".to_string(),
            )),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig {
        watch_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    config.monitor.poll_interval_ms = 20;
    config.notifications.enabled = false;
    config
}

#[tokio::test]
async fn test_offline_text_file_is_filed_by_extension() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "Buy milk\n!").unwrap();

    let backend = Scripted::offline();
    let mut organizer = Organizer::new(config(&dir), backend.clone()).unwrap();
    let report = organizer.organize_once(None).await.unwrap();

    let expected = dir
        .path()
        .join("AI Library")
        .join("Personal Documents")
        .join("notes.txt");
    assert_eq!(report.moved_files.len(), 1);
    assert_eq!(report.moved_files[0].to, expected);
    assert_eq!(report.moved_files[0].category, Category::PersonalDocuments);
    assert_eq!(
        report.moved_files[0].fallback,
        Some(FallbackReason::InferenceUnavailable)
    );
    assert_eq!(fs::read_to_string(&expected).unwrap(), "Buy milk\n!");
    assert!(!dir.path().join("notes.txt").exists());
    assert_eq!(backend.calls(), 1);
    assert!(report.categories_created.contains(&Category::PersonalDocuments));
}

#[tokio::test]
async fn test_offline_collision_gets_suffix() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("AI Library").join("Personal Documents");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("notes.txt"), "older notes").unwrap();
    fs::write(dir.path().join("notes.txt"), "Buy milk\n!").unwrap();

    let mut organizer = Organizer::new(config(&dir), Scripted::offline()).unwrap();
    let report = organizer.organize_once(None).await.unwrap();

    assert_eq!(report.moved_files[0].to, folder.join("notes_1.txt"));
    assert_eq!(fs::read_to_string(folder.join("notes.txt")).unwrap(), "older notes");
    assert_eq!(fs::read_to_string(folder.join("notes_1.txt")).unwrap(), "Buy milk\n!");
}

#[tokio::test]
async fn test_monitor_moves_existing_folder_to_manual_library() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("Old Project");
    fs::create_dir(&project).unwrap();
    fs::write(project.join("main.rs"), "fn main() {}").unwrap();
    // Files present at startup stay where they are
    fs::write(dir.path().join("keep.txt"), "already here").unwrap();

    let backend = Scripted::replying("Category: Personal Documents\nFilename: Later_Notes");
    let mut organizer = Organizer::new(config(&dir), backend.clone()).unwrap();
    let (tx, rx) = watch::channel(false);
    let arrival = dir.path().join("later.txt");

    let (report, _) = tokio::join!(organizer.run_monitor(rx, None), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        fs::write(&arrival, "written while monitoring").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(true).unwrap();
    });
    let report = report.unwrap();

    let moved = dir.path().join("Manual Library").join("Old Project");
    assert_eq!(report.moved_folders.len(), 1);
    assert_eq!(report.moved_folders[0].to, moved);
    assert_eq!(fs::read_to_string(moved.join("main.rs")).unwrap(), "fn main() {}");
    assert!(!project.exists());

    assert!(dir.path().join("keep.txt").exists());
    assert_eq!(report.moved_files.len(), 1);
    assert_eq!(
        report.moved_files[0].to,
        dir.path()
            .join("AI Library")
            .join("Personal Documents")
            .join("Later_Notes.txt")
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_identical_content_is_inferred_once() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("dl1.txt"), "Electricity bill for March").unwrap();
    fs::write(dir.path().join("dl2.txt"), "Electricity bill for March").unwrap();

    let backend =
        Scripted::replying("Category: Financial Documents\nFilename: Electric_Bill_March");
    let mut organizer = Organizer::new(config(&dir), backend.clone()).unwrap();
    let report = organizer.organize_once(None).await.unwrap();

    let folder = dir.path().join("AI Library").join("Financial Documents");
    assert_eq!(backend.calls(), 1);
    assert_eq!(report.inference_calls, 1);
    assert_eq!(report.moved_files.len(), 2);
    assert!(!report.moved_files[0].cache_hit);
    assert!(report.moved_files[1].cache_hit);
    assert_eq!(report.moved_files[0].to, folder.join("Electric_Bill_March.txt"));
    assert_eq!(report.moved_files[1].to, folder.join("Electric_Bill_March_1.txt"));
    assert_eq!(report.cache.hits, 1);
}

#[tokio::test]
async fn test_evicted_signature_is_inferred_again() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.cache.max_entries = 2;

    fs::write(dir.path().join("a.txt"), "alpha content").unwrap();
    fs::write(dir.path().join("b.txt"), "bravo content").unwrap();
    fs::write(dir.path().join("c.txt"), "charlie content").unwrap();

    let backend = Scripted::replying("Category: Personal Documents\nFilename: Shopping_List");
    let mut organizer = Organizer::new(config, backend.clone()).unwrap();
    let first = organizer.organize_once(None).await.unwrap();
    assert_eq!(first.moved_files.len(), 3);
    assert_eq!(backend.calls(), 3);
    assert_eq!(first.cache.entries, 2);
    assert_eq!(first.cache.evictions, 1);

    // `a` was least recently used, `c` is still cached
    fs::write(dir.path().join("a_again.txt"), "alpha content").unwrap();
    fs::write(dir.path().join("c_again.txt"), "charlie content").unwrap();
    let second = organizer.organize_once(None).await.unwrap();

    assert_eq!(backend.calls(), 4);
    assert_eq!(second.moved_files.len(), 2);
    assert!(!second.moved_files[0].cache_hit);
    assert!(second.moved_files[1].cache_hit);
}

#[tokio::test]
async fn test_second_pass_moves_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), "Buy milk").unwrap();
    fs::create_dir(dir.path().join("Photos")).unwrap();

    let mut organizer = Organizer::new(config(&dir), Scripted::offline()).unwrap();
    let first = organizer.organize_once(None).await.unwrap();
    assert_eq!(first.moves(), 2);

    let second = organizer.organize_once(None).await.unwrap();
    assert_eq!(second.moves(), 0);
    assert!(second.errors.is_empty());

    let mut fresh = Organizer::new(config(&dir), Scripted::offline()).unwrap();
    assert_eq!(fresh.organize_once(None).await.unwrap().moves(), 0);
}
