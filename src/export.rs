//! Per-locale export cache.
//!
//! Each locale's key→content map is built by one full scan and then served
//! from an in-process Moka cache. Every write that touches a locale bumps that
//! locale's generation; a cached map is only served while its generation is
//! current, so a scan that raced with a write can never be returned after the
//! write has completed. Concurrent misses on one locale share a single scan.
//!
//! Invalidation only sees writes made through this process. Writes from
//! another process (the `populate` command against a shared database) become
//! visible once the cached map expires, so their staleness bound is the TTL.

use dashmap::DashMap;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};

/// Key → content for one locale, ordered by key.
pub type ExportMap = BTreeMap<String, String>;

#[derive(Clone)]
struct CachedExport {
    generation: u64,
    entries: Arc<ExportMap>,
}

#[derive(Clone)]
pub struct ExportCache {
    inner: Arc<ExportCacheInner>,
}

struct ExportCacheInner {
    backend: Arc<dyn Backend>,
    entries: Cache<String, CachedExport>,
    generations: DashMap<String, u64>,
    scans: AtomicU64,
}

impl ExportCache {
    pub fn new(backend: Arc<dyn Backend>, capacity: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(ExportCacheInner {
                backend,
                entries,
                generations: DashMap::new(),
                scans: AtomicU64::new(0),
            }),
        }
    }

    fn generation(&self, locale: &str) -> u64 {
        self.inner
            .generations
            .get(locale)
            .map(|g| *g)
            .unwrap_or(0)
    }

    /// Full key→content map for `locale`.
    ///
    /// When several translations share a key (bulk-loaded data), the most
    /// recently updated one wins.
    pub async fn get_locale_map(&self, locale: &str) -> StoreResult<Arc<ExportMap>> {
        loop {
            let generation = self.generation(locale);
            let cached = self
                .inner
                .entries
                .try_get_with(locale.to_string(), self.scan(locale, generation))
                .await
                .map_err(shared_error)?;

            // a newer generation means the scan started after our request did
            if cached.generation >= generation {
                return Ok(cached.entries);
            }
            debug!("Discarding stale export for locale {}", locale);
            self.inner.entries.invalidate(locale).await;
        }
    }

    async fn scan(&self, locale: &str, generation: u64) -> StoreResult<CachedExport> {
        debug!("Export cache miss for locale {}, scanning", locale);
        self.inner.scans.fetch_add(1, Ordering::Relaxed);
        let rows = self.inner.backend.locale_entries(locale).await?;
        // oldest first, so later rows overwrite earlier ones
        Ok(CachedExport {
            generation,
            entries: Arc::new(rows.into_iter().collect()),
        })
    }

    /// Drop the cached map for `locale`. Call after the write has committed.
    pub async fn invalidate(&self, locale: &str) {
        {
            let mut generation = self
                .inner
                .generations
                .entry(locale.to_string())
                .or_insert(0);
            *generation += 1;
        }
        self.inner.entries.invalidate(locale).await;
        debug!("Export cache invalidated for locale {}", locale);
    }

    pub fn invalidate_all(&self) {
        for mut generation in self.inner.generations.iter_mut() {
            *generation += 1;
        }
        self.inner.entries.invalidate_all();
    }

    /// Number of full scans performed so far.
    pub fn scan_count(&self) -> u64 {
        self.inner.scans.load(Ordering::Relaxed)
    }
}

/// Loader errors are shared between every caller waiting on the same scan.
fn shared_error(error: Arc<StoreError>) -> StoreError {
    Arc::try_unwrap(error).unwrap_or_else(|shared| StoreError::Internal(shared.to_string()))
}
