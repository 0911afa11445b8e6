// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Content extraction: a bounded, model-friendly excerpt of a file

pub mod archive;
pub mod document;
pub mod media;
pub mod text;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::OrganizerError;

/// How the excerpt text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcerptKind {
    Text,
    Document,
    Spreadsheet,
    Archive,
    Audio,
    Image,
    /// Unrecognized or unparseable content: metadata only
    Binary,
    /// Above the size threshold: metadata only
    Large,
    /// Could not even be stat'ed or opened: metadata only
    Unreadable,
}

/// What the classifier gets to see of a file
#[derive(Debug, Clone)]
pub struct FileExcerpt {
    pub name: String,
    pub stem: String,
    /// Lowercase, without the dot; empty when there is none
    pub extension: String,
    pub size: u64,
    pub mime: &'static str,
    pub modified: Option<DateTime<Local>>,
    pub kind: ExcerptKind,
    pub text: String,
    pub truncated: bool,
}

impl FileExcerpt {
    pub fn is_metadata_only(&self) -> bool {
        self.text.is_empty()
    }

    /// Content block for a prompt, at most `max_chars` characters of text
    pub fn describe(&self, max_chars: usize) -> String {
        if self.is_metadata_only() {
            let what = match self.kind {
                ExcerptKind::Large => "Large file",
                ExcerptKind::Unreadable => "Unreadable file",
                _ if self.size == 0 => "Empty file",
                _ => "Binary file",
            };
            return format!("[{} - {}, {} bytes]", what, self.mime, self.size);
        }

        let (text, cut) = bound(&self.text, max_chars);
        if cut || self.truncated {
            format!("{}... [truncated]", text)
        } else {
            text
        }
    }
}

/// Reads bounded excerpts. Never fails: anything unreadable degrades to
/// a metadata-only excerpt.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_chars: usize,
    max_file_size: u64,
}

impl ContentExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            max_chars: config.max_content_chars,
            max_file_size: config.max_file_size,
        }
    }

    pub fn extract(&self, path: &Path) -> FileExcerpt {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let mime = mime_for(&extension);

        let mut excerpt = FileExcerpt {
            name,
            stem,
            extension,
            size: 0,
            mime,
            modified: None,
            kind: ExcerptKind::Unreadable,
            text: String::new(),
            truncated: false,
        };

        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                let err = OrganizerError::ExtractionFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                return excerpt;
            }
        };

        excerpt.size = meta.len();
        excerpt.modified = meta.modified().ok().map(DateTime::<Local>::from);

        if meta.len() > self.max_file_size {
            debug!("{:?} is {} bytes, describing by metadata only", path, meta.len());
            excerpt.kind = ExcerptKind::Large;
            return excerpt;
        }

        let read = match excerpt.extension.as_str() {
            "pdf" => document::pdf_text(path, self.max_chars).map(|t| (ExcerptKind::Document, t, false)),
            "docx" => document::docx_text(path, self.max_chars).map(|t| (ExcerptKind::Document, t, false)),
            "xlsx" | "xls" | "xlsm" | "ods" => {
                document::spreadsheet_text(path).map(|t| (ExcerptKind::Spreadsheet, t, false))
            }
            "zip" | "jar" | "tar" | "tgz" | "gz" => {
                archive::listing(path).map(|t| (ExcerptKind::Archive, t, false))
            }
            "mp3" => media::audio_tags(path).map(|t| (ExcerptKind::Audio, t, false)),
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tiff" | "tif" | "avif" => {
                media::image_summary(path).map(|t| (ExcerptKind::Image, t, false))
            }
            ext if text::is_text_extension(ext) => text::read_prefix(path, self.max_chars)
                .map(|(t, complete)| (ExcerptKind::Text, t, !complete)),
            _ => text::sniff(path, self.max_chars).map(|sniffed| match sniffed {
                Some((t, complete)) => (ExcerptKind::Text, t, !complete),
                None => (ExcerptKind::Binary, String::new(), false),
            }),
        };

        match read {
            Ok((kind, text, truncated)) => {
                let (text, cut) = bound(&text, self.max_chars);
                excerpt.kind = kind;
                excerpt.truncated = truncated || cut;
                excerpt.text = text;
            }
            Err(e) => {
                debug!("Excerpt of {:?} unavailable: {}", path, e);
                excerpt.kind = ExcerptKind::Binary;
            }
        }

        excerpt
    }
}

/// Cut `text` to at most `max_chars` characters; reports whether it cut
pub fn bound(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Best-effort media type from the extension
pub fn mime_for(extension: &str) -> &'static str {
    match extension {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" | "pptx" => "application/vnd.ms-powerpoint",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" | "tgz" => "application/gzip",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "dmg" => "application/x-apple-diskimage",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extractor(max_chars: usize, max_file_size: u64) -> ContentExtractor {
        ContentExtractor::new(&ExtractorConfig {
            max_content_chars: max_chars,
            max_file_size,
            ..ExtractorConfig::default()
        })
    }

    #[test]
    fn test_small_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Buy milk").unwrap();

        let excerpt = extractor(1500, 1024).extract(&path);
        assert_eq!(excerpt.kind, ExcerptKind::Text);
        assert_eq!(excerpt.text, "Buy milk");
        assert_eq!(excerpt.stem, "notes");
        assert_eq!(excerpt.extension, "txt");
        assert_eq!(excerpt.mime, "text/plain");
        assert_eq!(excerpt.size, 8);
        assert!(!excerpt.truncated);
    }

    #[test]
    fn test_long_text_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("essay.md");
        std::fs::write(&path, "é".repeat(5000)).unwrap();

        let excerpt = extractor(100, 1024 * 1024).extract(&path);
        assert_eq!(excerpt.text.chars().count(), 100);
        assert!(excerpt.truncated);
        assert!(excerpt.describe(50).ends_with("... [truncated]"));
    }

    #[test]
    fn test_large_file_is_metadata_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        let content = "x".repeat(4096);
        std::fs::write(&path, &content).unwrap();

        let excerpt = extractor(1500, 1024).extract(&path);
        assert_eq!(excerpt.kind, ExcerptKind::Large);
        assert!(excerpt.is_metadata_only());
        assert_ne!(excerpt.text, content);
        assert_eq!(excerpt.describe(800), "[Large file - text/plain, 4096 bytes]");
    }

    #[test]
    fn test_missing_file_fails_soft() {
        let dir = TempDir::new().unwrap();
        let excerpt = extractor(1500, 1024).extract(&dir.path().join("gone.pdf"));
        assert_eq!(excerpt.kind, ExcerptKind::Unreadable);
        assert_eq!(excerpt.name, "gone.pdf");
        assert!(excerpt.is_metadata_only());
    }

    #[test]
    fn test_binary_without_known_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.dat");
        std::fs::write(&path, [0u8, 159, 146, 150, 0, 1, 2, 3]).unwrap();

        let excerpt = extractor(1500, 1024).extract(&path);
        assert_eq!(excerpt.kind, ExcerptKind::Binary);
        assert!(excerpt.is_metadata_only());
    }

    #[test]
    fn test_unknown_extension_sniffed_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("README");
        std::fs::write(&path, "Project readme\nUsage: run it").unwrap();

        let excerpt = extractor(1500, 1024).extract(&path);
        assert_eq!(excerpt.kind, ExcerptKind::Text);
        assert!(excerpt.text.starts_with("Project readme"));
    }

    #[test]
    fn test_corrupt_pdf_degrades_to_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not really a pdf").unwrap();

        let excerpt = extractor(1500, 1024).extract(&path);
        assert_eq!(excerpt.kind, ExcerptKind::Binary);
        assert_eq!(excerpt.describe(800), "[Binary file - application/pdf, 16 bytes]");
    }

    #[test]
    fn test_bound_respects_char_boundaries() {
        assert_eq!(bound("héllo", 2), ("hé".to_string(), true));
        assert_eq!(bound("hi", 5), ("hi".to_string(), false));
    }
}
