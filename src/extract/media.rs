// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image and audio excerpts built from headers and tags

use id3::TagLike;
use std::path::Path;

use crate::{OrganizerError, Result};

/// Format and pixel size, read from the image header only
pub fn image_summary(path: &Path) -> Result<String> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| OrganizerError::Extract(format!("Unreadable image: {}", e)))?;

    let format = image::ImageFormat::from_path(path)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("unknown")
        .to_uppercase();

    let shape = if width == height {
        "square"
    } else if width > height {
        "landscape"
    } else {
        "portrait"
    };

    Ok(format!("{} image, {}x{} pixels, {}", format, width, height, shape))
}

/// ID3 tags of an MP3
pub fn audio_tags(path: &Path) -> Result<String> {
    let tag = id3::Tag::read_from_path(path)
        .map_err(|e| OrganizerError::Extract(format!("No ID3 tag: {}", e)))?;

    let mut lines = Vec::new();
    if let Some(title) = tag.title() {
        lines.push(format!("Title: {}", title));
    }
    if let Some(artist) = tag.artist() {
        lines.push(format!("Artist: {}", artist));
    }
    if let Some(album) = tag.album() {
        lines.push(format!("Album: {}", album));
    }
    if let Some(year) = tag.year() {
        lines.push(format!("Year: {}", year));
    }
    if let Some(genre) = tag.genre() {
        lines.push(format!("Genre: {}", genre));
    }

    if lines.is_empty() {
        return Err(OrganizerError::Extract("ID3 tag is empty".to_string()));
    }
    Ok(lines.join("\n"))
}
