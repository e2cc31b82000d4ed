//! Entry point wiring the store, search, export cache and populator together.
//!
//! Transport layers (HTTP handlers, CLI, jobs) call these methods and own
//! their own serialization and status mapping.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

use crate::backend::{Backend, MemoryBackend, PgBackend};
use crate::config::Config;
use crate::error::{PopulateError, StoreResult};
use crate::export::{ExportCache, ExportMap};
use crate::model::{LocaleStats, Translation, TranslationInput};
use crate::populate::BulkPopulator;
use crate::search::{Page, SearchEngine, SearchParams};
use crate::store::TranslationStore;
use crate::tags::TagResolver;

#[derive(Clone)]
pub struct TranslationService {
    store: TranslationStore,
    search: SearchEngine,
    populate_seed: Option<u64>,
}

impl TranslationService {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        let tags = TagResolver::new(Arc::clone(&backend));
        let exports = ExportCache::new(
            Arc::clone(&backend),
            config.export_cache_capacity,
            config.export_cache_ttl,
        );
        let search = SearchEngine::new(Arc::clone(&backend), config.search_max_page_size);
        Self {
            store: TranslationStore::new(backend, tags, exports),
            search,
            populate_seed: config.populate_seed,
        }
    }

    /// Service over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), &Config::in_memory())
    }

    /// Connect to PostgreSQL and make sure the schema exists.
    pub async fn connect(config: &Config) -> Result<Self> {
        let backend = PgBackend::connect(config).await?;
        backend.migrate().await?;
        info!("Connected to translation database");
        Ok(Self::new(Arc::new(backend), config))
    }

    pub async fn create_translation(&self, input: &TranslationInput) -> StoreResult<Translation> {
        self.store.create(input).await
    }

    pub async fn update_translation(
        &self,
        id: i64,
        input: &TranslationInput,
    ) -> StoreResult<Translation> {
        self.store.update(id, input).await
    }

    pub async fn get_translation(&self, id: i64) -> StoreResult<Option<Translation>> {
        self.store.get(id).await
    }

    pub async fn delete_translation(&self, id: i64) -> StoreResult<()> {
        self.store.delete(id).await
    }

    pub async fn search_translations(
        &self,
        params: SearchParams,
    ) -> StoreResult<Page<Translation>> {
        self.search.search(params).await
    }

    pub async fn export_locale(&self, locale: &str) -> StoreResult<Arc<ExportMap>> {
        self.store.export_locale(locale).await
    }

    pub async fn list_locales(&self) -> StoreResult<Vec<String>> {
        self.store.list_locales().await
    }

    pub async fn list_tags(&self) -> StoreResult<Vec<String>> {
        self.store.list_tags().await
    }

    pub async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats> {
        self.store.locale_stats(locale).await
    }

    /// Seed `count` synthetic translations, using `POPULATE_SEED` when configured.
    pub async fn populate_synthetic(&self, count: u64) -> Result<u64, PopulateError> {
        let mut rng = match self.populate_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.populate_with(count, &mut rng).await
    }

    pub async fn populate_with(&self, count: u64, rng: &mut StdRng) -> Result<u64, PopulateError> {
        BulkPopulator::new(self.store.clone())
            .populate(count, rng)
            .await
    }
}
