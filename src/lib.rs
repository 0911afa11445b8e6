// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI Files: a local AI downloads organizer
//!
//! Watches a downloads folder, classifies new files by content with a local
//! Ollama model, renames them descriptively and files them under
//! `AI Library/<category>`. New folders go to `Manual Library` untouched.

pub mod cache;
pub mod category;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod library;
pub mod monitor;
pub mod naming;
pub mod notifier;
pub mod ollama;
pub mod organizer;
pub mod resolver;
pub mod signature;

pub use config::AppConfig;
pub use error::{OrganizerError, Result};
pub use organizer::{Organizer, Report};
