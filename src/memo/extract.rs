//! Text and company metadata extraction from uploaded materials
//!
//! Extraction is deliberately shallow: textual uploads are decoded as UTF-8,
//! anything else is represented by a short notice so the generator knows a
//! file existed. Company metadata is guessed from the combined text.

use crate::deals::DealProfile;

/// Longest text kept per material
pub const MAX_MATERIAL_CHARS: usize = 50_000;

const MAX_FOUNDERS: usize = 5;
const MAX_NAME_WORDS: usize = 5;

/// Sector keywords checked in order; keywords of two letters must match a
/// whole word.
const SECTOR_KEYWORDS: &[(&str, &str)] = &[
    ("ai", "Artificial Intelligence"),
    ("health", "Healthcare"),
    ("fintech", "FinTech"),
    ("agri", "Agriculture"),
    ("edtech", "Education Technology"),
];

const DEFAULT_SECTOR: &str = "General";

/// Text extracted from one material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialText {
    pub filename: String,
    pub content_type: String,
    pub text: String,
    /// Whether `text` holds real content rather than a notice
    pub readable: bool,
}

impl MaterialText {
    /// Extract text from raw upload bytes
    pub fn extract(filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        let decoded = std::str::from_utf8(bytes)
            .ok()
            .filter(|text| !text.contains('\0'));

        let (text, readable) = match decoded {
            Some(text) => (truncate_chars(text.trim(), MAX_MATERIAL_CHARS), true),
            None => (
                format!(
                    "[{} ({}) could not be converted to text]",
                    filename, content_type
                ),
                false,
            ),
        };

        Self {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            text,
            readable,
        }
    }
}

/// Readable text of all materials, in upload order
pub fn combined_text(materials: &[MaterialText]) -> String {
    materials
        .iter()
        .filter(|m| m.readable && !m.text.is_empty())
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Guess company name, founders and sector from material text
pub fn derive_profile(text: &str) -> DealProfile {
    DealProfile {
        company_name: guess_company_name(text),
        founders: guess_founders(text),
        sector: Some(guess_sector(text)),
    }
}

/// First non-empty line that is short enough to be a name
fn guess_company_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.split_whitespace().count() <= MAX_NAME_WORDS)
        .map(str::to_string)
}

/// Names listed on `Founders: a, b` or `Team: a, b` lines
fn guess_founders(text: &str) -> Vec<String> {
    let mut founders = Vec::new();
    for line in text.lines().map(str::trim) {
        let lowered = line.to_lowercase();
        if !(lowered.starts_with("founder") || lowered.starts_with("team")) {
            continue;
        }
        let names = line.split_once(':').map(|(_, rest)| rest).unwrap_or(line);
        founders.extend(
            names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
    }
    founders.truncate(MAX_FOUNDERS);
    founders
}

fn guess_sector(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    SECTOR_KEYWORDS
        .iter()
        .find(|(key, _)| {
            words
                .iter()
                .any(|w| if key.len() <= 2 { w == key } else { w.starts_with(key) })
        })
        .map(|(_, sector)| sector.to_string())
        .unwrap_or_else(|| DEFAULT_SECTOR.to_string())
}

/// Cut a string to at most `max` characters, on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
