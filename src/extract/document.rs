// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Office and PDF document excerpts

use std::io::Read;
use std::path::Path;

use crate::{OrganizerError, Result};

/// Rows read from the first sheet of a workbook
const SHEET_ROWS: usize = 20;

/// Text layer of a PDF, whitespace collapsed
pub fn pdf_text(path: &Path, max_chars: usize) -> Result<String> {
    let bytes = std::fs::read(path)?;

    // pdf-extract panics on some malformed inputs
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| OrganizerError::Extract("PDF parser panicked".to_string()))?
        .map_err(|e| OrganizerError::Extract(format!("Text extraction failed: {}", e)))?;

    let text = collapse_whitespace(&extracted, max_chars);
    if text.is_empty() {
        return Err(OrganizerError::Extract("PDF has no text layer".to_string()));
    }
    Ok(text)
}

/// Visible text of a DOCX body (the `w:t` runs of word/document.xml)
pub fn docx_text(path: &Path, max_chars: usize) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| OrganizerError::Extract(format!("Failed to open DOCX: {}", e)))?;

    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|_| OrganizerError::Extract("No document.xml found".to_string()))?;

    let mut content = String::new();
    document_xml.read_to_string(&mut content)?;

    let mut text = String::new();
    let mut in_text = false;
    let mut tag = String::new();
    let mut in_tag = false;

    for c in content.chars() {
        match c {
            '<' => {
                in_tag = true;
                if in_text {
                    text.push(' ');
                }
                in_text = false;
                tag.clear();
            }
            '>' => {
                in_tag = false;
                // <w:t> or <w:t xml:space="preserve">, but not <w:tab/> or </w:t>
                in_text = (tag == "w:t" || tag.starts_with("w:t ")) && !tag.ends_with('/');
            }
            _ if in_tag => tag.push(c),
            _ if in_text => text.push(c),
            _ => {}
        }
        if text.len() > max_chars.saturating_mul(4) {
            break;
        }
    }

    Ok(collapse_whitespace(&decode_entities(&text), max_chars))
}

/// Sheet names plus the first rows of the first sheet, tab separated
pub fn spreadsheet_text(path: &Path) -> Result<String> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| OrganizerError::Extract(format!("Failed to open spreadsheet: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut text = format!("Sheets: {}\n", sheet_names.join(", "));

    if let Some(sheet_name) = sheet_names.first() {
        if let Ok(range) = workbook.worksheet_range(sheet_name) {
            for (i, row) in range.rows().enumerate() {
                if i >= SHEET_ROWS {
                    text.push_str("...\n");
                    break;
                }
                let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
                text.push_str(&cells.join("\t"));
                text.push('\n');
            }
        }
    }

    Ok(text)
}

fn collapse_whitespace(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for (count, word) in text.split_whitespace().enumerate() {
        if out.chars().count() >= max_chars.saturating_add(1) {
            break;
        }
        if count > 0 {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
