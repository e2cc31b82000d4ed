//! Translation and tag records plus input validation.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::error::{StoreError, StoreResult};

pub const MAX_KEY_CHARS: usize = 255;
pub const MAX_LOCALE_CHARS: usize = 10;
pub const MAX_TAG_CHARS: usize = 50;

/// Shared label attached to translations. Identity is the name alone.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub key: String,
    pub locale: String,
    pub content: String,
    pub tags: BTreeSet<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Translation {
    pub fn tag_names(&self) -> BTreeSet<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn has_any_tag(&self, names: &BTreeSet<String>) -> bool {
        self.tags.iter().any(|t| names.contains(&t.name))
    }
}

/// Caller-supplied fields for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationInput {
    pub key: String,
    pub locale: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TranslationInput {
    pub fn new<I, S>(key: &str, locale: &str, content: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.to_string(),
            locale: locale.to_string(),
            content: content.to_string(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Check field bounds and normalise tag names.
    pub fn validate(&self) -> StoreResult<BTreeSet<String>> {
        require_text("key", &self.key, Some(MAX_KEY_CHARS))?;
        require_text("locale", &self.locale, Some(MAX_LOCALE_CHARS))?;
        require_text("content", &self.content, None)?;
        normalize_tag_names(self.tags.as_slice())
    }
}

/// A validated translation ready to persist, with its tags already resolved.
#[derive(Debug, Clone)]
pub struct TranslationDraft {
    pub key: String,
    pub locale: String,
    pub content: String,
    pub tags: BTreeSet<Tag>,
}

/// Result of an update: the new record and the locale it had before.
#[derive(Debug, Clone)]
pub struct UpdatedTranslation {
    pub previous_locale: String,
    pub translation: Translation,
}

/// Per-locale summary counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleStats {
    pub locale: String,
    pub count: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

fn require_text(field: &str, value: &str, max_chars: Option<usize>) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!("{} is required", field)));
    }
    if let Some(max) = max_chars {
        let len = value.chars().count();
        if len > max {
            return Err(StoreError::validation(format!(
                "{} must not exceed {} characters, got {}",
                field, max, len
            )));
        }
    }
    Ok(())
}

/// Trim tag names and reject blank or oversized ones. Names stay case-sensitive.
pub fn normalize_tag_names<S: AsRef<str>>(names: &[S]) -> StoreResult<BTreeSet<String>> {
    let mut normalized = BTreeSet::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(StoreError::validation("tag name must not be blank"));
        }
        let len = trimmed.chars().count();
        if len > MAX_TAG_CHARS {
            return Err(StoreError::validation(format!(
                "tag name must not exceed {} characters, got {}",
                MAX_TAG_CHARS, len
            )));
        }
        normalized.insert(trimmed.to_string());
    }
    Ok(normalized)
}

/// Current time at the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::microseconds(1)).unwrap_or(now)
}

/// Next `updated_at` for a record: `now`, but always strictly after `previous`.
pub fn advance(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if now < floor {
        floor
    } else {
        now
    }
}
