// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for the organizer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for organizer operations
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Organizer error types
///
/// Only `Config`, `FileSystem` and `Api` are expected to end the process.
/// Everything else is recovered from at a component boundary and ends up
/// in the run report.
#[derive(Error, Debug)]
pub enum OrganizerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Inference service unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Malformed inference response: {0}")]
    MalformedInferenceResponse(String),

    #[error("Could not read {path:?}: {reason}")]
    ExtractionFailure { path: PathBuf, reason: String },

    #[error("Destination already taken: {0:?}")]
    MoveCollision(PathBuf),

    #[error("Copy of {from:?} to {to:?} failed: {reason}")]
    CrossVolumeCopyFailure {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Extraction error: {0}")]
    Extract(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl OrganizerError {
    /// Stable identifier used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::FileSystem(_) => "file_system",
            Self::Api(_) => "api",
            Self::InferenceUnavailable(_) => "inference_unavailable",
            Self::MalformedInferenceResponse(_) => "malformed_inference_response",
            Self::ExtractionFailure { .. } => "extraction_failure",
            Self::MoveCollision(_) => "move_collision",
            Self::CrossVolumeCopyFailure { .. } => "cross_volume_copy_failure",
            Self::Extract(_) => "extract",
            Self::Json(_) => "json",
            Self::Pattern(_) => "pattern",
        }
    }
}
