use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::CategoryCount;

/// MajorGroup
///
/// Coarse taxonomy buckets. Declaration order is the display order, so the derived
/// `Ord` is what sorts the aggregated output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub enum MajorGroup {
    Medical,
    Surgical,
    Specialty,
    Other,
}

pub const FALLBACK_DESCRIPTION: &str = "In-depth concepts and clinical notes.";

/// Category keys always offered to admins, whether or not any note uses them yet.
pub const RECOMMENDED_KEYS: [&str; 10] = [
    "anatomy",
    "physiology",
    "pathology",
    "pharmacology",
    "general_surgery",
    "orthopedics",
    "neurosurgery",
    "cardiology",
    "neurology",
    "endocrinology",
];

/// CategoryRule
///
/// One row of the mapping table. A category key matches when it equals `key` or
/// extends it with an underscore suffix (`anatomy_upper_limb` matches `anatomy`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub key: String,
    pub group: MajorGroup,
    pub description: String,
}

impl CategoryRule {
    fn new(key: &str, group: MajorGroup, description: &str) -> Self {
        CategoryRule {
            key: key.to_string(),
            group,
            description: description.to_string(),
        }
    }

    fn matches(&self, key: &str) -> bool {
        let rule = self.key.to_lowercase();
        key == rule || key.strip_prefix(&rule).is_some_and(|rest| rest.starts_with('_'))
    }
}

#[derive(Debug, Error)]
pub enum CategoryMapError {
    #[error("failed to read category map: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse category map: {0}")]
    Json(#[from] serde_json::Error),
}

/// CategoryMap
///
/// The key → (major group, description) lookup table. Rules are tried in order and
/// the first match wins; anything unmatched lands in `Other`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap {
    rules: Vec<CategoryRule>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        CategoryMap {
            rules: vec![
                CategoryRule::new(
                    "anatomy",
                    MajorGroup::Medical,
                    "Structure and organization of the human body",
                ),
                CategoryRule::new(
                    "physiology",
                    MajorGroup::Medical,
                    "Function of the human body systems",
                ),
                CategoryRule::new("pathology", MajorGroup::Medical, "Study of disease"),
                CategoryRule::new(
                    "cardiology",
                    MajorGroup::Specialty,
                    "Heart and vascular diseases",
                ),
                CategoryRule::new(
                    "general_surgery",
                    MajorGroup::Surgical,
                    "Common surgical procedures",
                ),
            ],
        }
    }
}

impl CategoryMap {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        CategoryMap { rules }
    }

    /// Loads a replacement table from a JSON array of `{key, group, description}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CategoryMapError> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<CategoryRule> = serde_json::from_str(&raw)?;
        Ok(CategoryMap { rules })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Resolves a raw key to its group and description.
    pub fn classify(&self, key: &str) -> (MajorGroup, &str) {
        let key = key.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&key))
            .map(|rule| (rule.group, rule.description.as_str()))
            .unwrap_or((MajorGroup::Other, FALLBACK_DESCRIPTION))
    }

    /// Builds the flat, ordered taxonomy from per-key published-note counts.
    pub fn aggregate(&self, counts: Vec<CategoryCount>) -> Vec<CategoryEntry> {
        let mut entries: Vec<CategoryEntry> = counts
            .into_iter()
            .map(|row| {
                let (major_group, description) = self.classify(&row.category);
                CategoryEntry {
                    name: display_name(&row.category),
                    description: description.to_string(),
                    db_name: row.category,
                    notes: row.note_count,
                    major_group,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            a.major_group
                .cmp(&b.major_group)
                .then_with(|| a.db_name.cmp(&b.db_name))
        });
        entries
    }
}

/// CategoryEntry
///
/// One subcategory in the public taxonomy. The output is a flat array ordered by
/// group then key; empty groups simply do not appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoryEntry {
    /// Human-readable name derived from the key.
    pub name: String,
    /// The raw key, used for filtering notes.
    pub db_name: String,
    /// Number of published notes under this key.
    #[ts(type = "number")]
    pub notes: i64,
    pub description: String,
    pub major_group: MajorGroup,
}

/// `general_surgery` → `General Surgery`. Both `_` and `-` separate words.
pub fn display_name(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Union of the stored keys and the recommended keys, deduplicated and sorted.
pub fn merge_with_recommended(existing: Vec<String>) -> Vec<String> {
    let mut all: Vec<String> = existing
        .into_iter()
        .chain(RECOMMENDED_KEYS.iter().map(|k| k.to_string()))
        .collect();
    all.sort();
    all.dedup();
    all
}
