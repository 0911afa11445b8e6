// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for the organizer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{OrganizerError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Directory to organize (usually the downloads folder)
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Reserved library folder names
    #[serde(default)]
    pub library: LibraryConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Content extraction limits
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Polling and stability settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Naming rules
    #[serde(default)]
    pub rules: RuleConfig,

    /// Desktop notifications
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_ai_library")]
    pub ai_library: String,
    #[serde(default = "default_manual_library")]
    pub manual_library: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts the classifier makes before falling back
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Files above this size are described by metadata only
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_prompt_excerpt_chars")]
    pub prompt_excerpt_chars: usize,
    /// Leading bytes hashed into a file signature
    #[serde(default = "default_signature_prefix_bytes")]
    pub signature_prefix_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Successive identical polls required before an entry counts as stable
    #[serde(default = "default_stable_polls")]
    pub stable_polls: u32,
    /// Files already present when monitoring starts are organized too
    #[serde(default)]
    pub process_existing: bool,
    /// Glob patterns for in-progress downloads and other names to leave alone
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleConfig {
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_true")]
    pub keep_well_named: bool,
    #[serde(default = "default_true")]
    pub date_from_content: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications")]
    pub enabled: bool,
}

/// Room for a date prefix plus a word or two
const MIN_NAME_LENGTH: usize = 16;

// Default value functions
fn default_ai_library() -> String { "AI Library".to_string() }
fn default_manual_library() -> String { "Manual Library".to_string() }
fn default_engine_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "gemma3:4b".to_string() }
fn default_timeout() -> u64 { 25 }
fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 60 }
fn default_max_content_chars() -> usize { 1500 }
fn default_max_file_size() -> u64 { 5 * 1024 * 1024 }
fn default_prompt_excerpt_chars() -> usize { 800 }
fn default_signature_prefix_bytes() -> u64 { 1024 * 1024 }
fn default_cache_entries() -> usize { 500 }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_stable_polls() -> u32 { 2 }
fn default_max_name_length() -> usize { 80 }
fn default_true() -> bool { true }
fn default_notifications() -> bool { cfg!(target_os = "macos") }

fn default_ignore() -> Vec<String> {
    ["*.part", "*.crdownload", "*.tmp", "*.partial", "*.download"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_watch_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("./Downloads"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            library: LibraryConfig::default(),
            ai_engine: EngineConfig::default(),
            extractor: ExtractorConfig::default(),
            cache: CacheConfig::default(),
            monitor: MonitorConfig::default(),
            rules: RuleConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            ai_library: default_ai_library(),
            manual_library: default_manual_library(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            retries: 0,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            max_file_size: default_max_file_size(),
            prompt_excerpt_chars: default_prompt_excerpt_chars(),
            signature_prefix_bytes: default_signature_prefix_bytes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stable_polls: default_stable_polls(),
            process_existing: false,
            ignore: default_ignore(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            keep_well_named: true,
            date_from_content: true,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| OrganizerError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the organizer cannot run with
    pub fn validate(&self) -> Result<()> {
        for name in [&self.library.ai_library, &self.library.manual_library] {
            if name.trim().is_empty() {
                return Err(OrganizerError::Config("Library names must not be empty".to_string()));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(OrganizerError::Config(format!(
                    "Library name {:?} must be a single folder name",
                    name
                )));
            }
        }
        if self.library.ai_library == self.library.manual_library {
            return Err(OrganizerError::Config(
                "AI and manual library names must differ".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(OrganizerError::Config("cache.max_entries must be at least 1".to_string()));
        }
        if self.monitor.stable_polls == 0 {
            return Err(OrganizerError::Config("monitor.stable_polls must be at least 1".to_string()));
        }
        if self.ai_engine.timeout_secs == 0 {
            return Err(OrganizerError::Config("ai_engine.timeout_secs must be at least 1".to_string()));
        }
        if self.rules.max_name_length < MIN_NAME_LENGTH {
            return Err(OrganizerError::Config(format!(
                "rules.max_name_length must be at least {}",
                MIN_NAME_LENGTH
            )));
        }
        Ok(())
    }
}
