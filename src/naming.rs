// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename hygiene: sanitizing model output, dates, well-named detection

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RuleConfig;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])(\d{4})-(\d{2})-(\d{2})(?:$|[^0-9])").expect("valid regex"));

static SEPARATED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^0-9])(\d{4})[_.](\d{2})[_.](\d{2})($|[^0-9])").expect("valid regex"));

static GENERIC_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(img|image)_?\d+$",
        r"^screenshot_?\d*$",
        r"^document_?\d*$",
        r"^file_?\d*$",
        r"^untitled",
        r"^new_?",
        r"^temp",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Turn a model reply (or any raw name) into a safe file stem.
///
/// Keeps the first non-empty line, drops `Filename:`/`Name:` prefixes and
/// quotes, maps every character outside `[A-Za-z0-9_.-]` (and non-ASCII
/// letters) to `_`, collapses runs of `_`, and caps the length. The result
/// never contains a path separator and never starts with a dot.
pub fn sanitize_name(raw: &str, max_len: usize) -> String {
    let mut clean = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();

    for prefix in ["filename:", "file name:", "name:"] {
        if clean.len() >= prefix.len()
            && clean.is_char_boundary(prefix.len())
            && clean[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            clean = clean[prefix.len()..].trim().to_string();
            break;
        }
    }

    clean = clean
        .trim_matches(|c| c == '"' || c == '\'' || c == '`' || c == '*')
        .to_string();

    clean = clean
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while clean.contains("__") {
        clean = clean.replace("__", "_");
    }

    let mut clean = clean.trim_matches(|c| c == '_' || c == '.').to_string();

    if clean.chars().count() > max_len {
        clean = clean.chars().take(max_len).collect();
        clean = clean.trim_end_matches(['_', '-', '.']).to_string();
    }

    clean
}

/// Drop a trailing `.ext` the model copied from the original name
pub fn strip_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        return stem.to_string();
    }
    let suffix = format!(".{}", extension.to_lowercase());
    let cut = stem.len().saturating_sub(suffix.len());
    if cut > 0 && stem.is_char_boundary(cut) && stem[cut..].eq_ignore_ascii_case(&suffix) {
        stem[..cut].to_string()
    } else {
        stem.to_string()
    }
}

/// Sanitized original stem, or `file` when nothing usable is left
pub fn fallback_name(original_stem: &str, max_len: usize) -> String {
    let name = sanitize_name(original_stem, max_len);
    if name.is_empty() {
        "file".to_string()
    } else {
        name
    }
}

/// First valid `YYYY-MM-DD` date in the text
pub fn find_date(text: &str) -> Option<NaiveDate> {
    ISO_DATE.captures_iter(text).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Rewrite `2024_01_15` / `2024.01.15` to `2024-01-15`
pub fn normalize_dates(name: &str) -> String {
    SEPARATED_DATE
        .replace_all(name, |caps: &regex::Captures| {
            let valid = NaiveDate::from_ymd_opt(
                caps[2].parse().unwrap_or(0),
                caps[3].parse().unwrap_or(0),
                caps[4].parse().unwrap_or(0),
            )
            .is_some();
            if valid {
                format!("{}{}-{}-{}{}", &caps[1], &caps[2], &caps[3], &caps[4], &caps[5])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Append `_YYYY-MM-DD` unless the name already carries a date
pub fn embed_date(name: &str, date: NaiveDate, max_len: usize) -> String {
    if find_date(name).is_some() {
        return name.to_string();
    }
    let suffix = format!("_{}", date.format("%Y-%m-%d"));
    let room = max_len.saturating_sub(suffix.len());
    let head: String = name.chars().take(room).collect();
    format!("{}{}", head.trim_end_matches(['_', '-', '.']), suffix)
}

/// Whether a stem already describes its file well enough to keep it
pub fn is_well_named(stem: &str) -> bool {
    if find_date(stem).is_some() {
        return true;
    }

    let lower = stem.to_lowercase();
    if GENERIC_NAMES.iter().any(|re| re.is_match(&lower)) {
        return false;
    }

    lower
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| w.chars().count() >= 3)
        .count()
        >= 2
}

/// Stem a file ends up with in the library
pub fn final_stem(original_stem: &str, proposed: &str, rules: &RuleConfig) -> String {
    if rules.keep_well_named && is_well_named(original_stem) {
        return fallback_name(original_stem, rules.max_name_length);
    }
    proposed.to_string()
}
