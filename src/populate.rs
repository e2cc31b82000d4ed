//! Synthetic bulk population for load testing.
//!
//! Records are generated and committed in chunks. Each chunk is its own
//! transaction: if a later chunk fails, the earlier ones stay committed and the
//! error reports how many records made it in.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::info;

use crate::error::PopulateError;
use crate::model::{Tag, TranslationDraft};
use crate::store::TranslationStore;

pub const LOCALES: [&str; 4] = ["en", "fr", "es", "de"];
pub const TAG_NAMES: [&str; 4] = ["mobile", "desktop", "web", "info"];
pub const KEY_PREFIXES: [&str; 5] = ["button", "label", "message", "title", "description"];

pub const CHUNK_SIZE: u64 = 1000;
const PROGRESS_EVERY: u64 = 10_000;

pub struct BulkPopulator {
    store: TranslationStore,
    chunk_size: u64,
}

impl BulkPopulator {
    pub fn new(store: TranslationStore) -> Self {
        Self {
            store,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Generate and commit `count` synthetic translations.
    ///
    /// The generated (key, locale) pairs may repeat; bulk data is exempt from
    /// the uniqueness rule.
    pub async fn populate<R: Rng + Send>(
        &self,
        count: u64,
        rng: &mut R,
    ) -> Result<u64, PopulateError> {
        info!("Starting database population with {} records", count);

        let names: BTreeSet<String> = TAG_NAMES.iter().map(|s| s.to_string()).collect();
        let tags: Vec<Tag> = self
            .store
            .tag_resolver()
            .resolve(&names)
            .await
            .map_err(|source| PopulateError {
                committed: 0,
                source,
            })?
            .into_iter()
            .collect();

        let mut committed = 0;
        let mut start = 0;
        while start < count {
            let end = (start + self.chunk_size).min(count);
            let chunk = generate_chunk(start, end, &tags, rng);

            let written = self
                .store
                .insert_chunk(&chunk)
                .await
                .map_err(|source| PopulateError { committed, source })?;
            committed += written;

            if committed / PROGRESS_EVERY > start / PROGRESS_EVERY {
                info!("Created {} translations...", committed);
            }
            start = end;
        }

        info!("Database population completed with {} records", committed);
        Ok(committed)
    }
}

/// Build drafts for indexes `start..end`.
pub fn generate_chunk<R: Rng + ?Sized>(
    start: u64,
    end: u64,
    tags: &[Tag],
    rng: &mut R,
) -> Vec<TranslationDraft> {
    (start..end)
        .map(|index| {
            let prefix = KEY_PREFIXES[rng.gen_range(0..KEY_PREFIXES.len())];
            let key = format!("{}.{}", prefix, index % 1000);
            let locale = LOCALES[rng.gen_range(0..LOCALES.len())];
            let content = placeholder_content(&key, locale);

            let tag_count = rng.gen_range(0..=3);
            let chosen: BTreeSet<Tag> = (0..tag_count)
                .filter_map(|_| tags.choose(&mut *rng).cloned())
                .collect();

            TranslationDraft {
                key,
                locale: locale.to_string(),
                content,
                tags: chosen,
            }
        })
        .collect()
}

pub fn placeholder_content(key: &str, locale: &str) -> String {
    match locale {
        "en" => format!("Sample content for English {}", key),
        "fr" => format!("Contenu d'exemple pour {}", key),
        "es" => format!("Contenido de ejemplo para {}", key),
        "de" => format!("Beispielinhalt für {}", key),
        _ => format!("Sample content for {}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MemoryBackend};
    use crate::export::ExportCache;
    use crate::search::{SearchEngine, SearchParams};
    use crate::tags::TagResolver;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn store(backend: Arc<MemoryBackend>) -> TranslationStore {
        let exports = ExportCache::new(backend.clone(), 16, Duration::from_secs(300));
        TranslationStore::new(backend.clone(), TagResolver::new(backend), exports)
    }

    fn sample_tags() -> Vec<Tag> {
        TAG_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| Tag {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect()
    }

    // ==================== Generation Tests ====================

    #[test]
    fn test_generate_chunk_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let drafts = generate_chunk(1995, 2010, &sample_tags(), &mut rng);

        assert_eq!(drafts.len(), 15);
        for (offset, draft) in drafts.iter().enumerate() {
            let index = 1995 + offset as u64;
            let (prefix, suffix) = draft.key.split_once('.').expect("prefix.index");
            assert!(KEY_PREFIXES.contains(&prefix));
            assert_eq!(suffix, (index % 1000).to_string());
            assert!(LOCALES.contains(&draft.locale.as_str()));
            assert_eq!(draft.content, placeholder_content(&draft.key, &draft.locale));
            assert!(draft.tags.len() <= 3);
        }
    }

    #[test]
    fn test_generation_is_reproducible_with_seed() {
        let tags = sample_tags();
        let a = generate_chunk(0, 50, &tags, &mut StdRng::seed_from_u64(42));
        let b = generate_chunk(0, 50, &tags, &mut StdRng::seed_from_u64(42));

        let keys = |drafts: &[TranslationDraft]| {
            drafts
                .iter()
                .map(|d| (d.key.clone(), d.locale.clone(), d.tags.len()))
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&a), keys(&b));
    }

    #[test]
    fn test_placeholder_content_per_locale() {
        assert_eq!(
            placeholder_content("button.1", "en"),
            "Sample content for English button.1"
        );
        assert_eq!(
            placeholder_content("button.1", "de"),
            "Beispielinhalt für button.1"
        );
        assert_eq!(placeholder_content("x", "it"), "Sample content for x");
    }

    // ==================== Populate Tests ====================

    #[tokio::test]
    async fn test_populate_creates_exact_count() {
        let backend = Arc::new(MemoryBackend::new());
        let populator = BulkPopulator::new(store(backend.clone()));

        let created = populator
            .populate(5000, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert_eq!(created, 5000);
        assert_eq!(backend.translation_count(), 5000);
        assert_eq!(backend.tag_count(), TAG_NAMES.len());

        let locales = backend.list_locales().await.unwrap();
        assert!(locales.iter().all(|l| LOCALES.contains(&l.as_str())));
    }

    #[tokio::test]
    async fn test_populate_reuses_existing_tags() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(backend.clone());
        store
            .tag_resolver()
            .resolve_names(&["web", "custom"])
            .await
            .unwrap();

        BulkPopulator::new(store)
            .with_chunk_size(7)
            .populate(30, &mut StdRng::seed_from_u64(3))
            .await
            .unwrap();

        assert_eq!(backend.tag_count(), 5);
    }

    #[tokio::test]
    async fn test_populated_tags_come_from_fixed_set() {
        let backend = Arc::new(MemoryBackend::new());
        BulkPopulator::new(store(backend.clone()))
            .populate(300, &mut StdRng::seed_from_u64(9))
            .await
            .unwrap();

        let page = SearchEngine::new(backend.clone(), 100)
            .search(SearchParams {
                page_size: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_count, 300);
        for translation in page.items {
            assert!(translation.tags.len() <= 3);
            assert!(translation
                .tags
                .iter()
                .all(|t| TAG_NAMES.contains(&t.name.as_str())));
        }
    }

    #[tokio::test]
    async fn test_populate_zero() {
        let backend = Arc::new(MemoryBackend::new());
        let created = BulkPopulator::new(store(backend.clone()))
            .populate(0, &mut StdRng::seed_from_u64(0))
            .await
            .unwrap();
        assert_eq!(created, 0);
        assert_eq!(backend.translation_count(), 0);
    }
}
