// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! The closed set of library categories

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Category a file is filed under inside the AI Library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    WorkDocuments,
    PersonalDocuments,
    Images,
    Screenshots,
    Videos,
    AudioMusic,
    CodeDevelopment,
    ArchivesDownloads,
    FinancialDocuments,
    EducationalMaterials,
    CreativeProjects,
    SystemFiles,
    Entertainment,
    HealthMedical,
    Travel,
    RecipesFood,
    ShoppingReceipts,
    LegalDocuments,
    ReferenceMaterials,
    Other,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Category::WorkDocuments,
        Category::PersonalDocuments,
        Category::Images,
        Category::Screenshots,
        Category::Videos,
        Category::AudioMusic,
        Category::CodeDevelopment,
        Category::ArchivesDownloads,
        Category::FinancialDocuments,
        Category::EducationalMaterials,
        Category::CreativeProjects,
        Category::SystemFiles,
        Category::Entertainment,
        Category::HealthMedical,
        Category::Travel,
        Category::RecipesFood,
        Category::ShoppingReceipts,
        Category::LegalDocuments,
        Category::ReferenceMaterials,
        Category::Other,
    ];

    /// Label the model is asked to answer with
    pub fn label(&self) -> &'static str {
        match self {
            Category::WorkDocuments => "Work Documents",
            Category::PersonalDocuments => "Personal Documents",
            Category::Images => "Images",
            Category::Screenshots => "Screenshots",
            Category::Videos => "Videos",
            Category::AudioMusic => "Audio/Music",
            Category::CodeDevelopment => "Code/Development",
            Category::ArchivesDownloads => "Archives/Downloads",
            Category::FinancialDocuments => "Financial Documents",
            Category::EducationalMaterials => "Educational Materials",
            Category::CreativeProjects => "Creative Projects",
            Category::SystemFiles => "System Files",
            Category::Entertainment => "Entertainment",
            Category::HealthMedical => "Health/Medical",
            Category::Travel => "Travel",
            Category::RecipesFood => "Recipes/Food",
            Category::ShoppingReceipts => "Shopping/Receipts",
            Category::LegalDocuments => "Legal Documents",
            Category::ReferenceMaterials => "Reference Materials",
            Category::Other => "Other",
        }
    }

    /// Folder name inside the AI Library. Labels with a slash would nest, so
    /// the slash becomes an ampersand.
    pub fn folder_name(&self) -> String {
        self.label().replace('/', " & ")
    }

    /// Exact, case-insensitive lookup by label or folder name
    pub fn from_label(text: &str) -> Option<Category> {
        let text = text.trim();
        Category::ALL.into_iter().find(|c| {
            c.label().eq_ignore_ascii_case(text) || c.folder_name().eq_ignore_ascii_case(text)
        })
    }

    /// Heuristic used when the model cannot be asked
    pub fn from_extension(extension: &str, stem: &str) -> Category {
        let name = stem.to_lowercase();
        let ext = extension.trim_start_matches('.').to_lowercase();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "heic" | "heif" | "bmp" | "tiff" | "tif"
            | "svg" | "avif" => {
                if name.contains("screenshot") || name.contains("screen shot") {
                    Category::Screenshots
                } else {
                    Category::Images
                }
            }
            "mp4" | "mkv" | "webm" | "avi" | "mov" | "m4v" | "wmv" => Category::Videos,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" | "opus" => Category::AudioMusic,
            "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "hpp" | "rb" | "sh"
            | "html" | "css" | "json" | "yaml" | "yml" | "toml" | "xml" | "sql" | "ipynb" => {
                Category::CodeDevelopment
            }
            "zip" | "tar" | "gz" | "tgz" | "7z" | "rar" | "bz2" | "xz" | "dmg" | "iso" | "pkg"
            | "exe" | "msi" | "deb" | "rpm" | "appimage" => Category::ArchivesDownloads,
            "pdf" | "doc" | "docx" | "odt" | "rtf" | "txt" | "md" | "pages" => {
                if name.contains("invoice") || name.contains("receipt") || name.contains("statement") {
                    Category::FinancialDocuments
                } else if name.contains("contract") || name.contains("agreement") {
                    Category::LegalDocuments
                } else if name.contains("manual") || name.contains("guide") {
                    Category::ReferenceMaterials
                } else {
                    Category::PersonalDocuments
                }
            }
            "xls" | "xlsx" | "csv" | "ods" | "numbers" | "ppt" | "pptx" | "odp" | "key" => {
                Category::WorkDocuments
            }
            "epub" | "mobi" => Category::ReferenceMaterials,
            "psd" | "ai" | "sketch" | "fig" | "blend" | "kra" | "xcf" => Category::CreativeProjects,
            "ics" | "ttf" | "otf" | "woff" | "woff2" | "plist" | "ini" | "log" | "sys" | "dll" => {
                Category::SystemFiles
            }
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category {:?}", label)))
    }
}

/// Pick the category named in a model reply.
///
/// Rule: use the text after a `Category:` line when there is one, otherwise
/// the whole reply. If its first non-empty line (stripped of quotes, bullets
/// and trailing punctuation) is exactly a label, that label wins. Otherwise
/// the longest label occurring anywhere in the text wins, the earliest
/// occurrence breaking ties. Anything else is `Other`.
pub fn parse_category(reply: &str) -> Category {
    let section = category_section(reply);

    if let Some(first) = section.lines().map(str::trim).find(|l| !l.is_empty()) {
        if let Some(category) = Category::from_label(strip_decoration(first)) {
            return category;
        }
    }

    let haystack = section.to_lowercase();
    let mut best: Option<(usize, usize, Category)> = None;
    for category in Category::ALL {
        for needle in [category.label().to_lowercase(), category.folder_name().to_lowercase()] {
            if let Some(pos) = haystack.find(&needle) {
                let candidate = (needle.len(), pos, category);
                best = match best {
                    Some((len, at, _)) if len > candidate.0 || (len == candidate.0 && at <= pos) => best,
                    _ => Some(candidate),
                };
            }
        }
    }

    best.map(|(_, _, category)| category).unwrap_or(Category::Other)
}

/// Text following a `Category:` marker, up to the end of that line
fn category_section(reply: &str) -> &str {
    for line in reply.lines() {
        let trimmed = strip_decoration(line);
        match trimmed.get(..9) {
            Some(head) if head.eq_ignore_ascii_case("category:") => return trimmed[9..].trim(),
            _ => {}
        }
    }
    reply
}

fn strip_decoration(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['-', '*', '•', '#', '>', ' '])
        .trim_end_matches(['.', '!', ',', ';'])
        .trim_matches(['"', '\'', '`', '*'])
        .trim()
}
