//! Persistence backends.
//!
//! Every operation that has to be atomic is a single trait method, so each
//! backend can make it atomic its own way (one transaction for PostgreSQL,
//! one write-lock acquisition for the in-memory store).

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::model::{LocaleStats, Tag, Translation, TranslationDraft, UpdatedTranslation};
use crate::search::SearchQuery;

/// Outcome of inserting a batch of new tag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInsert {
    /// Every name was new and is now committed.
    Inserted(Vec<Tag>),
    /// Another writer committed at least one of the names first; nothing was written.
    Conflict,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up existing tags by exact name.
    async fn find_tags(&self, names: &[String]) -> StoreResult<Vec<Tag>>;

    /// Insert all names in one unit; reports `Conflict` instead of failing on a taken name.
    async fn insert_tags(&self, names: &[String]) -> StoreResult<TagInsert>;

    /// All tag names, sorted.
    async fn list_tag_names(&self) -> StoreResult<Vec<String>>;

    /// Whether any translation already holds this (key, locale) pair.
    async fn fingerprint_exists(&self, key: &str, locale: &str) -> StoreResult<bool>;

    /// Insert a translation unless its (key, locale) pair is already taken.
    ///
    /// Returns `StoreError::DuplicateKey` when the pair exists. The check and
    /// the insert are atomic with respect to other creates.
    async fn insert_translation(
        &self,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Translation>;

    /// Replace every mutable field of a translation. `None` when the id is unknown.
    async fn update_translation(
        &self,
        id: i64,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<UpdatedTranslation>>;

    async fn get_translation(&self, id: i64) -> StoreResult<Option<Translation>>;

    /// Remove a translation and its tag links. Returns its locale when it existed.
    async fn delete_translation(&self, id: i64) -> StoreResult<Option<String>>;

    /// Insert a chunk of translations in one transaction without the uniqueness check.
    async fn insert_batch(&self, drafts: &[TranslationDraft], now: DateTime<Utc>)
        -> StoreResult<u64>;

    /// One page of matches plus the total match count.
    async fn search(&self, query: &SearchQuery) -> StoreResult<(Vec<Translation>, u64)>;

    /// (key, content) pairs for a locale, oldest update first.
    async fn locale_entries(&self, locale: &str) -> StoreResult<Vec<(String, String)>>;

    /// Distinct locales, sorted.
    async fn list_locales(&self) -> StoreResult<Vec<String>>;

    async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats>;
}
