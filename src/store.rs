//! Translation create/read/update/delete with the (key, locale) uniqueness rule.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::export::{ExportCache, ExportMap};
use crate::model::{now, LocaleStats, Translation, TranslationDraft, TranslationInput};
use crate::tags::TagResolver;

#[derive(Clone)]
pub struct TranslationStore {
    backend: Arc<dyn Backend>,
    tags: TagResolver,
    exports: ExportCache,
}

impl TranslationStore {
    pub fn new(backend: Arc<dyn Backend>, tags: TagResolver, exports: ExportCache) -> Self {
        Self {
            backend,
            tags,
            exports,
        }
    }

    pub fn tag_resolver(&self) -> &TagResolver {
        &self.tags
    }

    /// Create a translation. Fails with `DuplicateKey` if the pair is taken.
    pub async fn create(&self, input: &TranslationInput) -> StoreResult<Translation> {
        let tag_names = input.validate()?;

        if self
            .backend
            .fingerprint_exists(&input.key, &input.locale)
            .await?
        {
            return Err(StoreError::DuplicateKey {
                key: input.key.clone(),
                locale: input.locale.clone(),
            });
        }

        let draft = self.draft(input, &tag_names).await?;
        // re-checked atomically by the backend
        let created = self.backend.insert_translation(&draft, now()).await?;
        self.exports.invalidate(&created.locale).await;

        info!(
            "Created translation {} ({} / {}) with {} tags",
            created.id,
            created.key,
            created.locale,
            created.tags.len()
        );
        Ok(created)
    }

    /// Replace every mutable field, including the tag set.
    ///
    /// The new (key, locale) pair is not checked against other records.
    pub async fn update(&self, id: i64, input: &TranslationInput) -> StoreResult<Translation> {
        let tag_names = input.validate()?;

        if self.backend.get_translation(id).await?.is_none() {
            return Err(StoreError::NotFound(id));
        }

        let draft = self.draft(input, &tag_names).await?;
        let updated = self
            .backend
            .update_translation(id, &draft, now())
            .await?
            .ok_or(StoreError::NotFound(id))?;

        self.exports.invalidate(&updated.previous_locale).await;
        if updated.previous_locale != updated.translation.locale {
            self.exports.invalidate(&updated.translation.locale).await;
        }

        info!("Updated translation {}", id);
        Ok(updated.translation)
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Translation>> {
        self.backend.get_translation(id).await
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let locale = self
            .backend
            .delete_translation(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        self.exports.invalidate(&locale).await;

        info!("Deleted translation {}", id);
        Ok(())
    }

    /// Write a chunk of already-resolved drafts as one batch, skipping the
    /// duplicate check.
    pub async fn insert_chunk(&self, drafts: &[TranslationDraft]) -> StoreResult<u64> {
        let written = self.backend.insert_batch(drafts, now()).await?;

        let locales: BTreeSet<&str> = drafts.iter().map(|d| d.locale.as_str()).collect();
        for locale in locales {
            self.exports.invalidate(locale).await;
        }
        debug!("Committed chunk of {} translations", written);
        Ok(written)
    }

    pub async fn export_locale(&self, locale: &str) -> StoreResult<Arc<ExportMap>> {
        self.exports.get_locale_map(locale).await
    }

    pub async fn list_locales(&self) -> StoreResult<Vec<String>> {
        self.backend.list_locales().await
    }

    pub async fn list_tags(&self) -> StoreResult<Vec<String>> {
        self.backend.list_tag_names().await
    }

    pub async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats> {
        self.backend.locale_stats(locale).await
    }

    async fn draft(
        &self,
        input: &TranslationInput,
        tag_names: &BTreeSet<String>,
    ) -> StoreResult<TranslationDraft> {
        Ok(TranslationDraft {
            key: input.key.clone(),
            locale: input.locale.clone(),
            content: input.content.clone(),
            tags: self.tags.resolve(tag_names).await?,
        })
    }
}
