//! Multi-criteria translation search with pagination.
//!
//! Two mutually exclusive modes:
//! - tag mode: any translation carrying at least one of the requested tags;
//!   key, content and locale filters are ignored.
//! - text mode: case-insensitive substring match on key and content, exact
//!   match on locale, all present filters combined with AND.
//!
//! Results are ordered by `updated_at` descending, then id descending.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::model::{normalize_tag_names, Translation};

/// Raw search parameters as a caller supplies them.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub key: Option<String>,
    pub content: Option<String>,
    pub locale: Option<String>,
    pub tags: Vec<String>,
    pub page: u32,
    pub page_size: u32,
}

/// Validated, normalised search handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub key: Option<String>,
    pub content: Option<String>,
    pub locale: Option<String>,
    pub tags: BTreeSet<String>,
    pub page: u32,
    pub page_size: u32,
}

impl SearchQuery {
    pub fn is_tag_mode(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    /// Filter predicate, used by backends that evaluate queries in process.
    ///
    /// Case folding is full Unicode here; PostgreSQL `lower()` folds per the
    /// database ctype and only agrees on non-ASCII text under a UTF-8 ctype.
    pub fn matches(&self, translation: &Translation) -> bool {
        if self.is_tag_mode() {
            return translation.has_any_tag(&self.tags);
        }
        if let Some(key) = &self.key {
            if !contains_ignore_case(&translation.key, key) {
                return false;
            }
        }
        if let Some(content) = &self.content {
            if !contains_ignore_case(&translation.content, content) {
                return false;
            }
        }
        if let Some(locale) = &self.locale {
            if translation.locale != *locale {
                return false;
            }
        }
        true
    }
}

/// Most recently updated first; id breaks ties.
pub fn newest_first(a: &Translation, b: &Translation) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn non_empty(filter: Option<String>) -> Option<String> {
    filter.filter(|f| !f.is_empty())
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(self.page_size))
    }
}

#[derive(Clone)]
pub struct SearchEngine {
    backend: Arc<dyn Backend>,
    max_page_size: u32,
}

impl SearchEngine {
    pub fn new(backend: Arc<dyn Backend>, max_page_size: u32) -> Self {
        Self {
            backend,
            max_page_size,
        }
    }

    /// Validate parameters into a backend query.
    pub fn prepare(&self, params: SearchParams) -> StoreResult<SearchQuery> {
        if params.page_size == 0 || params.page_size > self.max_page_size {
            return Err(StoreError::validation(format!(
                "page size must be between 1 and {}, got {}",
                self.max_page_size, params.page_size
            )));
        }
        Ok(SearchQuery {
            key: non_empty(params.key),
            content: non_empty(params.content),
            locale: non_empty(params.locale),
            tags: normalize_tag_names(params.tags.as_slice())?,
            page: params.page,
            page_size: params.page_size,
        })
    }

    pub async fn search(&self, params: SearchParams) -> StoreResult<Page<Translation>> {
        let query = self.prepare(params)?;
        let (items, total_count) = self.backend.search(&query).await?;
        debug!(
            "Search (tag mode: {}) matched {} translations, returning {} on page {}",
            query.is_tag_mode(),
            total_count,
            items.len(),
            query.page
        );
        Ok(Page {
            items,
            total_count,
            page: query.page,
            page_size: query.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::model::Tag;
    use chrono::{Duration, Utc};

    fn translation(id: i64, key: &str, locale: &str, content: &str, tags: &[&str]) -> Translation {
        let at = Utc::now();
        Translation {
            id,
            key: key.to_string(),
            locale: locale.to_string(),
            content: content.to_string(),
            tags: tags
                .iter()
                .enumerate()
                .map(|(i, name)| Tag {
                    id: i as i64 + 1,
                    name: name.to_string(),
                })
                .collect(),
            created_at: at,
            updated_at: at,
        }
    }

    fn engine() -> SearchEngine {
        SearchEngine::new(Arc::new(MemoryBackend::new()), 50)
    }

    fn params(page: u32, page_size: u32) -> SearchParams {
        SearchParams {
            page,
            page_size,
            ..Default::default()
        }
    }

    // ==================== Predicate Tests ====================

    #[test]
    fn test_text_mode_is_case_insensitive_substring() {
        let query = engine()
            .prepare(SearchParams {
                key: Some("BUTTON".to_string()),
                content: Some("sav".to_string()),
                ..params(0, 10)
            })
            .unwrap();

        assert!(query.matches(&translation(1, "button.save", "en", "Save", &[])));
        assert!(!query.matches(&translation(2, "button.save", "en", "Cancel", &[])));
        assert!(!query.matches(&translation(3, "label.save", "en", "Save", &[])));
    }

    #[test]
    fn test_text_mode_folds_non_ascii_case() {
        let query = engine()
            .prepare(SearchParams {
                content: Some("ÉCRAN".to_string()),
                ..params(0, 10)
            })
            .unwrap();

        assert!(query.matches(&translation(1, "title.screen", "fr", "Mon écran", &[])));
        assert!(!query.matches(&translation(2, "title.screen", "fr", "Mon ecran", &[])));
    }

    #[test]
    fn test_locale_filter_is_exact() {
        let query = engine()
            .prepare(SearchParams {
                locale: Some("en".to_string()),
                ..params(0, 10)
            })
            .unwrap();

        assert!(query.matches(&translation(1, "k", "en", "c", &[])));
        assert!(!query.matches(&translation(2, "k", "EN", "c", &[])));
        assert!(!query.matches(&translation(3, "k", "en-GB", "c", &[])));
    }

    #[test]
    fn test_tag_mode_ignores_text_filters() {
        let query = engine()
            .prepare(SearchParams {
                key: Some("nothing-matches-this".to_string()),
                locale: Some("zz".to_string()),
                tags: vec!["mobile".to_string(), "web".to_string()],
                ..params(0, 10)
            })
            .unwrap();

        assert!(query.is_tag_mode());
        assert!(query.matches(&translation(1, "a", "en", "c", &["web"])));
        assert!(query.matches(&translation(2, "b", "fr", "c", &["info", "mobile"])));
        assert!(!query.matches(&translation(3, "c", "en", "c", &["info"])));
        assert!(!query.matches(&translation(4, "d", "en", "c", &[])));
    }

    #[test]
    fn test_empty_filters_are_absent() {
        let query = engine()
            .prepare(SearchParams {
                key: Some(String::new()),
                content: Some(String::new()),
                locale: Some(String::new()),
                ..params(0, 10)
            })
            .unwrap();

        assert_eq!(query.key, None);
        assert_eq!(query.locale, None);
        assert!(query.matches(&translation(1, "k", "de", "c", &[])));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_page_size_bounds() {
        let engine = engine();
        assert!(engine.prepare(params(0, 0)).unwrap_err().is_validation());
        assert!(engine.prepare(params(0, 51)).unwrap_err().is_validation());
        assert!(engine.prepare(params(0, 50)).is_ok());
        assert!(engine.prepare(params(u32::MAX, 1)).is_ok());
    }

    #[test]
    fn test_blank_tag_filter_rejected() {
        let err = engine()
            .prepare(SearchParams {
                tags: vec!["  ".to_string()],
                ..params(0, 10)
            })
            .unwrap_err();
        assert!(err.is_validation());
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_newest_first_orders_by_updated_then_id() {
        let mut older = translation(5, "a", "en", "c", &[]);
        older.updated_at -= Duration::seconds(10);
        let tie_low = translation(1, "b", "en", "c", &[]);
        let mut tie_high = translation(2, "c", "en", "c", &[]);
        tie_high.updated_at = tie_low.updated_at;

        let mut items = vec![older, tie_low, tie_high];
        items.sort_by(newest_first);

        let ids: Vec<i64> = items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1, 5]);
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<Translation> = Page {
            items: vec![],
            total_count: 41,
            page: 0,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_query_offset() {
        let query = engine().prepare(params(3, 20)).unwrap();
        assert_eq!(query.offset(), 60);
    }
}
