use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{Backend, TagInsert};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    advance, LocaleStats, Tag, Translation, TranslationDraft, UpdatedTranslation,
};
use crate::search::{newest_first, SearchQuery};

type Fingerprint = (String, String);

#[derive(Default)]
struct State {
    last_translation_id: i64,
    last_tag_id: i64,
    translations: BTreeMap<i64, Translation>,
    /// (key, locale) -> ids. Bulk loads may put several ids under one pair.
    fingerprints: HashMap<Fingerprint, BTreeSet<i64>>,
    tags: BTreeMap<String, Tag>,
}

impl State {
    fn link(&mut self, translation: &Translation) {
        self.fingerprints
            .entry((translation.key.clone(), translation.locale.clone()))
            .or_default()
            .insert(translation.id);
    }

    fn unlink(&mut self, translation: &Translation) {
        let fingerprint = (translation.key.clone(), translation.locale.clone());
        if let Some(ids) = self.fingerprints.get_mut(&fingerprint) {
            ids.remove(&translation.id);
            if ids.is_empty() {
                self.fingerprints.remove(&fingerprint);
            }
        }
    }

    fn insert(&mut self, draft: &TranslationDraft, now: DateTime<Utc>) -> Translation {
        self.last_translation_id += 1;
        let translation = Translation {
            id: self.last_translation_id,
            key: draft.key.clone(),
            locale: draft.locale.clone(),
            content: draft.content.clone(),
            tags: draft.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        self.link(&translation);
        self.translations.insert(translation.id, translation.clone());
        translation
    }
}

/// Process-local backend. A single lock guards all state, so every trait
/// method is one atomic step and readers never see half-applied writes.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tag rows, including ones no translation uses.
    pub fn tag_count(&self) -> usize {
        self.state.read().tags.len()
    }

    pub fn translation_count(&self) -> usize {
        self.state.read().translations.len()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn find_tags(&self, names: &[String]) -> StoreResult<Vec<Tag>> {
        let state = self.state.read();
        Ok(names
            .iter()
            .filter_map(|name| state.tags.get(name).cloned())
            .collect())
    }

    async fn insert_tags(&self, names: &[String]) -> StoreResult<TagInsert> {
        let mut state = self.state.write();
        if names.iter().any(|name| state.tags.contains_key(name)) {
            return Ok(TagInsert::Conflict);
        }
        let mut inserted = Vec::with_capacity(names.len());
        for name in names {
            if let Some(existing) = state.tags.get(name) {
                // repeated name within one call
                inserted.push(existing.clone());
                continue;
            }
            state.last_tag_id += 1;
            let tag = Tag {
                id: state.last_tag_id,
                name: name.clone(),
            };
            state.tags.insert(name.clone(), tag.clone());
            inserted.push(tag);
        }
        Ok(TagInsert::Inserted(inserted))
    }

    async fn list_tag_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.read().tags.keys().cloned().collect())
    }

    async fn fingerprint_exists(&self, key: &str, locale: &str) -> StoreResult<bool> {
        let fingerprint = (key.to_string(), locale.to_string());
        Ok(self.state.read().fingerprints.contains_key(&fingerprint))
    }

    async fn insert_translation(
        &self,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Translation> {
        let mut state = self.state.write();
        let fingerprint = (draft.key.clone(), draft.locale.clone());
        if state.fingerprints.contains_key(&fingerprint) {
            return Err(StoreError::DuplicateKey {
                key: draft.key.clone(),
                locale: draft.locale.clone(),
            });
        }
        Ok(state.insert(draft, now))
    }

    async fn update_translation(
        &self,
        id: i64,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<UpdatedTranslation>> {
        let mut state = self.state.write();
        let Some(previous) = state.translations.get(&id).cloned() else {
            return Ok(None);
        };
        state.unlink(&previous);

        let translation = Translation {
            id,
            key: draft.key.clone(),
            locale: draft.locale.clone(),
            content: draft.content.clone(),
            tags: draft.tags.clone(),
            created_at: previous.created_at,
            updated_at: advance(previous.updated_at, now),
        };
        state.link(&translation);
        state.translations.insert(id, translation.clone());

        Ok(Some(UpdatedTranslation {
            previous_locale: previous.locale,
            translation,
        }))
    }

    async fn get_translation(&self, id: i64) -> StoreResult<Option<Translation>> {
        Ok(self.state.read().translations.get(&id).cloned())
    }

    async fn delete_translation(&self, id: i64) -> StoreResult<Option<String>> {
        let mut state = self.state.write();
        let Some(removed) = state.translations.remove(&id) else {
            return Ok(None);
        };
        state.unlink(&removed);
        Ok(Some(removed.locale))
    }

    async fn insert_batch(
        &self,
        drafts: &[TranslationDraft],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.write();
        for draft in drafts {
            state.insert(draft, now);
        }
        Ok(drafts.len() as u64)
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<(Vec<Translation>, u64)> {
        let state = self.state.read();
        let mut matched: Vec<&Translation> = state
            .translations
            .values()
            .filter(|t| query.matches(t))
            .collect();
        matched.sort_by(|a, b| newest_first(a, b));

        let total = matched.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn locale_entries(&self, locale: &str) -> StoreResult<Vec<(String, String)>> {
        let state = self.state.read();
        let mut rows: Vec<&Translation> = state
            .translations
            .values()
            .filter(|t| t.locale == locale)
            .collect();
        rows.sort_by(|a, b| newest_first(b, a));
        Ok(rows
            .into_iter()
            .map(|t| (t.key.clone(), t.content.clone()))
            .collect())
    }

    async fn list_locales(&self) -> StoreResult<Vec<String>> {
        let state = self.state.read();
        let locales: BTreeSet<&str> = state
            .translations
            .values()
            .map(|t| t.locale.as_str())
            .collect();
        Ok(locales.into_iter().map(str::to_string).collect())
    }

    async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats> {
        let state = self.state.read();
        let mut count = 0;
        let mut last_updated = None;
        for translation in state.translations.values().filter(|t| t.locale == locale) {
            count += 1;
            last_updated = last_updated.max(Some(translation.updated_at));
        }
        Ok(LocaleStats {
            locale: locale.to_string(),
            count,
            last_updated,
        })
    }
}
