// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Archive excerpts: a listing of what is inside

use std::collections::BTreeMap;
use std::path::Path;

use crate::{OrganizerError, Result};

const SAMPLE_FILES: usize = 15;
const MAX_ENTRIES: usize = 200;

#[derive(Debug, Default)]
struct ArchiveContents {
    file_count: usize,
    total_size: u64,
    extensions: BTreeMap<String, usize>,
    sample_files: Vec<String>,
}

impl ArchiveContents {
    fn record(&mut self, name: String, size: u64) {
        self.file_count += 1;
        self.total_size += size;

        if let Some(ext) = Path::new(&name).extension().and_then(|e| e.to_str()) {
            *self.extensions.entry(ext.to_lowercase()).or_insert(0) += 1;
        }
        if self.sample_files.len() < SAMPLE_FILES {
            self.sample_files.push(name);
        }
    }

    fn render(&self, kind: &str) -> String {
        let mut text = format!(
            "{} archive with {} entries ({} bytes uncompressed)\n",
            kind, self.file_count, self.total_size
        );
        if !self.extensions.is_empty() {
            let mut by_count: Vec<_> = self.extensions.iter().collect();
            by_count.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            let summary: Vec<String> = by_count
                .iter()
                .take(8)
                .map(|(ext, n)| format!("{} .{}", n, ext))
                .collect();
            text.push_str(&format!("Types: {}\n", summary.join(", ")));
        }
        text.push_str("Files:\n");
        for name in &self.sample_files {
            text.push_str(name);
            text.push('\n');
        }
        if self.file_count > self.sample_files.len() {
            text.push_str("...\n");
        }
        text
    }
}

/// Listing of a zip, tar or gzipped tar archive
pub fn listing(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "zip" | "jar" => list_zip(path).map(|c| c.render("ZIP")),
        "tar" => list_tar(path, false).map(|c| c.render("TAR")),
        "tgz" | "gz" => list_tar(path, true).map(|c| c.render("Gzipped TAR")),
        other => Err(OrganizerError::Extract(format!("Not an archive: {}", other))),
    }
}

fn list_zip(path: &Path) -> Result<ArchiveContents> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| OrganizerError::Extract(format!("Failed to open ZIP: {}", e)))?;

    let mut contents = ArchiveContents::default();
    for i in 0..archive.len().min(MAX_ENTRIES) {
        if let Ok(entry) = archive.by_index(i) {
            if entry.is_dir() {
                continue;
            }
            contents.record(entry.name().to_string(), entry.size());
        }
    }
    if archive.len() > MAX_ENTRIES {
        contents.file_count = archive.len();
    }

    Ok(contents)
}

fn list_tar(path: &Path, gzipped: bool) -> Result<ArchiveContents> {
    let file = std::fs::File::open(path)?;
    let reader: Box<dyn std::io::Read> = if gzipped {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut archive = tar::Archive::new(reader);
    let mut contents = ArchiveContents::default();

    let entries = archive
        .entries()
        .map_err(|e| OrganizerError::Extract(format!("Failed to read TAR: {}", e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| OrganizerError::Extract(format!("Corrupt TAR entry: {}", e)))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = entry
            .path()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        contents.record(name, entry.size());

        if contents.file_count >= MAX_ENTRIES {
            break;
        }
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_zip_listing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.zip");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for name in ["src/main.rs", "src/lib.rs", "Cargo.toml"] {
            zip.start_file(name, options).unwrap();
            zip.write_all(b"fn main() {}").unwrap();
        }
        zip.finish().unwrap();

        let text = listing(&path).unwrap();
        assert!(text.starts_with("ZIP archive with 3 entries"));
        assert!(text.contains("2 .rs"));
        assert!(text.contains("Cargo.toml"));
    }

    #[test]
    fn test_tar_gz_listing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photos.tar.gz");
        let file = std::fs::File::create(&path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for name in ["beach.jpg", "sunset.jpg"] {
            let data = b"jpegdata";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &data[..]).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();

        let text = listing(&path).unwrap();
        assert!(text.starts_with("Gzipped TAR archive with 2 entries (16 bytes"));
        assert!(text.contains("beach.jpg"));
    }

    #[test]
    fn test_not_an_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.zip");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(listing(&path).is_err());
    }
}
