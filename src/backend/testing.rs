//! In-memory backend with knobs for contention and slow scans, for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::{Backend, MemoryBackend, TagInsert};
use crate::error::StoreResult;
use crate::model::{LocaleStats, Tag, Translation, TranslationDraft, UpdatedTranslation};
use crate::search::SearchQuery;

#[derive(Default)]
pub(crate) struct InstrumentedBackend {
    pub inner: MemoryBackend,
    /// Number of `insert_tags` calls that lose to another writer.
    pub lost_tag_rounds: u32,
    /// Whether the other writer commits the first requested name when we lose.
    pub rival_commits: bool,
    pub tag_inserts: AtomicU32,
    pub scan_delay: Duration,
}

impl InstrumentedBackend {
    pub fn losing_tag_rounds(rounds: u32, rival_commits: bool) -> Self {
        Self {
            lost_tag_rounds: rounds,
            rival_commits,
            ..Self::default()
        }
    }

    pub fn with_scan_delay(delay: Duration) -> Self {
        Self {
            scan_delay: delay,
            ..Self::default()
        }
    }

    pub fn tag_inserts(&self) -> u32 {
        self.tag_inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for InstrumentedBackend {
    async fn find_tags(&self, names: &[String]) -> StoreResult<Vec<Tag>> {
        self.inner.find_tags(names).await
    }

    async fn insert_tags(&self, names: &[String]) -> StoreResult<TagInsert> {
        let round = self.tag_inserts.fetch_add(1, Ordering::SeqCst);
        if round < self.lost_tag_rounds {
            if self.rival_commits {
                self.inner.insert_tags(&names[..1]).await?;
            }
            return Ok(TagInsert::Conflict);
        }
        self.inner.insert_tags(names).await
    }

    async fn list_tag_names(&self) -> StoreResult<Vec<String>> {
        self.inner.list_tag_names().await
    }

    async fn fingerprint_exists(&self, key: &str, locale: &str) -> StoreResult<bool> {
        self.inner.fingerprint_exists(key, locale).await
    }

    async fn insert_translation(
        &self,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Translation> {
        self.inner.insert_translation(draft, now).await
    }

    async fn update_translation(
        &self,
        id: i64,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<UpdatedTranslation>> {
        self.inner.update_translation(id, draft, now).await
    }

    async fn get_translation(&self, id: i64) -> StoreResult<Option<Translation>> {
        self.inner.get_translation(id).await
    }

    async fn delete_translation(&self, id: i64) -> StoreResult<Option<String>> {
        self.inner.delete_translation(id).await
    }

    async fn insert_batch(
        &self,
        drafts: &[TranslationDraft],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner.insert_batch(drafts, now).await
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<(Vec<Translation>, u64)> {
        self.inner.search(query).await
    }

    async fn locale_entries(&self, locale: &str) -> StoreResult<Vec<(String, String)>> {
        if !self.scan_delay.is_zero() {
            tokio::time::sleep(self.scan_delay).await;
        }
        self.inner.locale_entries(locale).await
    }

    async fn list_locales(&self) -> StoreResult<Vec<String>> {
        self.inner.list_locales().await
    }

    async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats> {
        self.inner.locale_stats(locale).await
    }
}
