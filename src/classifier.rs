// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classifier: one (category, name) decision per file

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::category::{parse_category, Category};
use crate::config::{AppConfig, RuleConfig};
use crate::extract::{ContentExtractor, FileExcerpt};
use crate::naming;
use crate::ollama::InferenceBackend;
use crate::signature::FileSignature;
use crate::{OrganizerError, Result};

/// Category and name decided for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// File stem, without extension
    pub proposed_name: String,
    pub fallback_used: bool,
}

/// Why the heuristic was used instead of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    InferenceUnavailable,
    MalformedResponse,
    Unreadable,
}

/// Outcome of classifying a file. There is no error case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Classified {
        result: ClassificationResult,
        cache_hit: bool,
    },
    Fallback {
        result: ClassificationResult,
        reason: FallbackReason,
    },
}

impl Classification {
    pub fn result(&self) -> &ClassificationResult {
        match self {
            Self::Classified { result, .. } | Self::Fallback { result, .. } => result,
        }
    }

    pub fn cache_hit(&self) -> bool {
        matches!(self, Self::Classified { cache_hit: true, .. })
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Fallback { reason, .. } => Some(*reason),
            Self::Classified { .. } => None,
        }
    }
}

pub struct Classifier {
    backend: Arc<dyn InferenceBackend>,
    cache: Arc<ResponseCache>,
    extractor: ContentExtractor,
    /// Per-signature gates so identical content is sent to the model once
    inflight: Mutex<HashMap<FileSignature, Arc<tokio::sync::Mutex<()>>>>,
    retries: u32,
    retry_delay: Duration,
    rules: RuleConfig,
    prompt_chars: usize,
    signature_prefix: u64,
    inference_calls: AtomicU64,
}

impl Classifier {
    pub fn new(config: &AppConfig, backend: Arc<dyn InferenceBackend>, cache: Arc<ResponseCache>) -> Self {
        Self {
            backend,
            cache,
            extractor: ContentExtractor::new(&config.extractor),
            inflight: Mutex::new(HashMap::new()),
            retries: config.ai_engine.retries,
            retry_delay: Duration::from_secs(1),
            rules: config.rules.clone(),
            prompt_chars: config.extractor.prompt_excerpt_chars,
            signature_prefix: config.extractor.signature_prefix_bytes,
            inference_calls: AtomicU64::new(0),
        }
    }

    /// First backoff delay; doubles on each further retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Requests sent to the inference backend so far, retries included
    pub fn inference_calls(&self) -> u64 {
        self.inference_calls.load(Ordering::Relaxed)
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Decide category and name for the file at `path`
    pub async fn classify(&self, path: &Path) -> Classification {
        let signature = match FileSignature::compute(path, self.signature_prefix) {
            Ok(signature) => signature,
            Err(e) => {
                warn!("Cannot fingerprint {:?}: {}", path, e);
                return self.fallback(path, FallbackReason::Unreadable);
            }
        };

        if let Some(cached) = self.cache.get(&signature) {
            debug!("Cache hit for {:?} ({})", path, signature.short_hex());
            return self.from_cache(path, cached);
        }

        let gate = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            inflight.entry(signature).or_default().clone()
        };

        let outcome = {
            let _turn = gate.lock().await;

            // Someone holding the gate before us may have filled the cache
            if self.cache.contains(&signature) {
                if let Some(cached) = self.cache.get(&signature) {
                    debug!("Cache filled while waiting for {:?}", path);
                    return self.release(signature, &gate, self.from_cache(path, cached));
                }
            }

            self.classify_uncached(path, signature).await
        };

        self.release(signature, &gate, outcome)
    }

    async fn classify_uncached(&self, path: &Path, signature: FileSignature) -> Classification {
        let excerpt = self.extractor.extract(path);
        let prompt = build_prompt(&excerpt, self.prompt_chars);

        let reply = match self.infer(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                let reason = match e {
                    OrganizerError::MalformedInferenceResponse(_) => FallbackReason::MalformedResponse,
                    _ => FallbackReason::InferenceUnavailable,
                };
                warn!("Classifying {:?} without the model: {}", path, e);
                return self.fallback(path, reason);
            }
        };

        if reply.trim().is_empty() {
            warn!("Empty reply from {} for {:?}", self.backend.model(), path);
            return self.fallback(path, FallbackReason::MalformedResponse);
        }

        let model_result = ClassificationResult {
            category: parse_category(&reply),
            proposed_name: self.name_from_reply(&reply, &excerpt),
            fallback_used: false,
        };
        info!(
            "Classified {:?} as {} ({})",
            excerpt.name, model_result.category, model_result.proposed_name
        );

        self.cache.put(signature, model_result.clone());
        Classification::Classified {
            result: self.personalize(&excerpt.stem, model_result),
            cache_hit: false,
        }
    }

    async fn infer(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            self.inference_calls.fetch_add(1, Ordering::Relaxed);
            match self.backend.generate(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.retries => {
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt);
                    warn!("Inference failed ({}), retrying in {:?} (attempt {})", e, delay, attempt + 2);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cached results hold the model's name; the file's own stem may still win
    fn from_cache(&self, path: &Path, cached: ClassificationResult) -> Classification {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Classification::Classified {
            result: self.personalize(&stem, cached),
            cache_hit: true,
        }
    }

    fn personalize(&self, original_stem: &str, result: ClassificationResult) -> ClassificationResult {
        ClassificationResult {
            proposed_name: naming::final_stem(original_stem, &result.proposed_name, &self.rules),
            ..result
        }
    }

    fn fallback(&self, path: &Path, reason: FallbackReason) -> Classification {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Classification::Fallback {
            result: ClassificationResult {
                category: Category::from_extension(&extension, &stem),
                proposed_name: naming::fallback_name(&stem, self.rules.max_name_length),
                fallback_used: true,
            },
            reason,
        }
    }

    fn name_from_reply(&self, reply: &str, excerpt: &FileExcerpt) -> String {
        let max_len = self.rules.max_name_length;

        let name = match filename_line(reply) {
            Some(line) => naming::sanitize_name(line, max_len),
            None => String::new(),
        };
        let name = naming::normalize_dates(&naming::strip_extension(&name, &excerpt.extension));

        let name = if name.chars().count() < 3 {
            naming::fallback_name(&excerpt.stem, max_len)
        } else {
            name
        };

        if self.rules.date_from_content {
            if let Some(date) = naming::find_date(&excerpt.text) {
                return naming::embed_date(&name, date, max_len);
            }
        }
        name
    }

    fn release(
        &self,
        signature: FileSignature,
        gate: &Arc<tokio::sync::Mutex<()>>,
        outcome: Classification,
    ) -> Classification {
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map plus ours: nobody else is waiting
        if Arc::strong_count(gate) <= 2 {
            inflight.remove(&signature);
        }
        outcome
    }
}

/// The `Filename:` line of a reply, if the model gave one
fn filename_line(reply: &str) -> Option<&str> {
    reply
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', ' ']))
        .find(|line| {
            let lower = line.to_lowercase();
            lower.starts_with("filename:") || lower.starts_with("file name:") || lower.starts_with("name:")
        })
}

/// Single prompt asking for both the category and a filename
pub fn build_prompt(excerpt: &FileExcerpt, content_chars: usize) -> String {
    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
    let modified = excerpt
        .modified
        .map(|m| m.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let extension = if excerpt.extension.is_empty() {
        "none".to_string()
    } else {
        format!(".{}", excerpt.extension)
    };

    format!(
        "You are organizing a downloads folder. Classify the file below and suggest a descriptive filename.\n\
         \n\
         Original name: {name}\n\
         Extension: {extension}\n\
         Type: {mime}\n\
         Size: {size} bytes\n\
         Modified: {modified}\n\
         Content:\n\
         {content}\n\
         \n\
         Categories: {labels}\n\
         \n\
         Filename rules:\n\
         - Describe what the file is about, not its format\n\
         - Use underscores instead of spaces\n\
         - Write dates as YYYY-MM-DD when the content shows one\n\
         - At most 100 characters, no extension\n\
         \n\
         Answer with exactly two lines:\n\
         Category: <one category from the list>\n\
         Filename: <descriptive_name>",
        name = excerpt.name,
        extension = extension,
        mime = excerpt.mime,
        size = excerpt.size,
        modified = modified,
        content = excerpt.describe(content_chars),
        labels = labels.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use tempfile::TempDir;

    /// Backend that answers from a script and counts calls
    struct ScriptedBackend {
        reply: Option<String>,
        failures_left: AtomicU32,
        delay: Duration,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                failures_left: AtomicU32::new(0),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                reply: None,
                ..Self::replying("")
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            match &self.reply {
                Some(reply) if !fail => Ok(reply.clone()),
                _ => Err(OrganizerError::InferenceUnavailable("scripted".to_string())),
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn classifier(backend: Arc<ScriptedBackend>, config: &AppConfig) -> Classifier {
        Classifier::new(config, backend, Arc::new(ResponseCache::new(config.cache.max_entries)))
            .with_retry_delay(Duration::from_millis(1))
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_model_reply_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scan0001.pdf", "plain text pretending to be a pdf");
        let backend = Arc::new(ScriptedBackend::replying(
            "Category: Financial Documents\nFilename: Electric Bill March.pdf",
        ));
        let classifier = classifier(backend.clone(), &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert_eq!(
            outcome,
            Classification::Classified {
                result: ClassificationResult {
                    category: Category::FinancialDocuments,
                    proposed_name: "Electric_Bill_March".to_string(),
                    fallback_used: false,
                },
                cache_hit: false,
            }
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_identical_content_hits_cache() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "dl1.txt", "Recipe: pancakes with maple syrup");
        let second = write(&dir, "dl2.txt", "Recipe: pancakes with maple syrup");
        let backend = Arc::new(ScriptedBackend::replying(
            "Category: Recipes/Food\nFilename: Pancake_Recipe",
        ));
        let classifier = classifier(backend.clone(), &AppConfig::default());

        let a = classifier.classify(&first).await;
        let b = classifier.classify(&second).await;

        assert!(!a.cache_hit());
        assert!(b.cache_hit());
        assert_eq!(a.result(), b.result());
        assert_eq!(backend.calls(), 1);
        assert_eq!(classifier.inference_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_content_single_call() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "one.txt", "Boarding pass LHR to JFK");
        let second = write(&dir, "two.txt", "Boarding pass LHR to JFK");
        let backend = Arc::new(ScriptedBackend {
            delay: Duration::from_millis(50),
            ..ScriptedBackend::replying("Category: Travel\nFilename: Boarding_Pass_LHR_JFK")
        });
        let classifier = classifier(backend.clone(), &AppConfig::default());

        let (a, b) = tokio::join!(classifier.classify(&first), classifier.classify(&second));

        assert_eq!(a.result().category, Category::Travel);
        assert_eq!(b.result().category, Category::Travel);
        assert!(a.cache_hit() ^ b.cache_hit());
        assert_eq!(backend.calls(), 1);
        assert!(classifier.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_falls_back_to_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "notes.txt", "Buy milk");
        let backend = Arc::new(ScriptedBackend::unavailable());
        let classifier = classifier(backend.clone(), &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::InferenceUnavailable));
        assert_eq!(outcome.result().category, Category::PersonalDocuments);
        assert_eq!(outcome.result().proposed_name, "notes");
        assert!(outcome.result().fallback_used);

        // Fallbacks are not cached
        assert!(classifier.cache().is_empty());
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "photo.jpg", "not an image");
        let classifier = classifier(Arc::new(ScriptedBackend::replying("   \n")), &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert_eq!(outcome.fallback_reason(), Some(FallbackReason::MalformedResponse));
        assert_eq!(outcome.result().category, Category::Images);
    }

    #[tokio::test]
    async fn test_unrecognized_label_is_other() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "thing.txt", "Assorted words");
        let backend = Arc::new(ScriptedBackend::replying("Category: Banana\nFilename: Assorted_Words"));
        let classifier = classifier(backend, &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert!(outcome.fallback_reason().is_none());
        assert_eq!(outcome.result().category, Category::Other);
        assert_eq!(outcome.result().proposed_name, "Assorted_Words");
    }

    #[tokio::test]
    async fn test_retries_before_fallback() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "x.txt", "Lease agreement");
        let backend = Arc::new(ScriptedBackend {
            failures_left: AtomicU32::new(1),
            ..ScriptedBackend::replying("Category: Legal Documents\nFilename: Lease_Agreement")
        });
        let mut config = AppConfig::default();
        config.ai_engine.retries = 1;
        let classifier = classifier(backend.clone(), &config);

        let outcome = classifier.classify(&path).await;
        assert_eq!(outcome.result().category, Category::LegalDocuments);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_content_date_is_embedded() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "inv.txt", "Invoice dated 2024-03-05, total 42 EUR");
        let backend = Arc::new(ScriptedBackend::replying("Category: Financial Documents\nFilename: Hosting_Invoice"));
        let classifier = classifier(backend, &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert_eq!(outcome.result().proposed_name, "Hosting_Invoice_2024-03-05");
    }

    #[tokio::test]
    async fn test_well_named_file_keeps_its_name() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Quarterly Sales Review.txt", "Sales went up");
        let backend = Arc::new(ScriptedBackend::replying("Category: Work Documents\nFilename: Sales_Report"));
        let classifier = classifier(backend, &AppConfig::default());

        let outcome = classifier.classify(&path).await;
        assert_eq!(outcome.result().category, Category::WorkDocuments);
        assert_eq!(outcome.result().proposed_name, "Quarterly_Sales_Review");
    }

    #[test]
    fn test_prompt_lists_categories_and_content() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "notes.txt", "Buy milk");
        let excerpt = ContentExtractor::new(&AppConfig::default().extractor).extract(&path);

        let prompt = build_prompt(&excerpt, 800);
        assert!(prompt.contains("Original name: notes.txt"));
        assert!(prompt.contains("Buy milk"));
        assert!(prompt.contains("Reference Materials"));
        assert!(prompt.ends_with("Filename: <descriptive_name>"));
    }

    #[test]
    fn test_filename_line() {
        assert_eq!(filename_line("Category: Travel\nFilename: Trip"), Some("Filename: Trip"));
        assert_eq!(filename_line("- Filename: Trip"), Some("Filename: Trip"));
        assert_eq!(filename_line("Category: Travel"), None);
    }
}
