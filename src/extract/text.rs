// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Plain-text excerpts

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::Result;

const SNIFF_BYTES: usize = 8192;

/// Extensions read as text without sniffing
pub fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "txt" | "md" | "markdown" | "rst" | "adoc" | "asciidoc" | "org" | "tex" | "log"
            | "csv" | "tsv" | "json" | "yaml" | "yml" | "toml" | "xml" | "ini" | "cfg"
            | "html" | "htm" | "css" | "js" | "ts" | "py" | "rs" | "go" | "java" | "c"
            | "cpp" | "h" | "hpp" | "rb" | "sh" | "sql" | "srt" | "vtt" | "ics" | "vcf"
            | "eml" | "svg"
    )
}

/// Read the leading `max_chars` characters of a text file.
///
/// Returns the text and whether the whole file was read.
pub fn read_prefix(path: &Path, max_chars: usize) -> Result<(String, bool)> {
    // Four bytes per char is the UTF-8 worst case
    let budget = max_chars.saturating_mul(4).saturating_add(4);
    let bytes = read_head(path, budget)?;
    let complete = bytes.len() < budget;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), complete))
}

/// Read the file as text if its head looks textual, `None` for binary data
pub fn sniff(path: &Path, max_chars: usize) -> Result<Option<(String, bool)>> {
    let head = read_head(path, SNIFF_BYTES)?;
    if !looks_textual(&head) {
        return Ok(None);
    }
    read_prefix(path, max_chars).map(Some)
}

fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut bytes = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// No NUL bytes and mostly valid UTF-8
fn looks_textual(head: &[u8]) -> bool {
    if head.is_empty() || head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte char cut at the sniff boundary is still text
        Err(e) => e.error_len().is_none() && e.valid_up_to() + 4 >= head.len(),
    }
}
