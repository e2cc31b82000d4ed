use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::{Backend, TagInsert};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::model::{LocaleStats, Tag, Translation, TranslationDraft, UpdatedTranslation};
use crate::search::SearchQuery;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tags (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(50) NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS translations (
        id BIGSERIAL PRIMARY KEY,
        translation_key VARCHAR(255) NOT NULL,
        locale VARCHAR(10) NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    // not unique: bulk-populated rows may share a (key, locale) pair
    "CREATE INDEX IF NOT EXISTS idx_key_locale ON translations (translation_key, locale)",
    "CREATE INDEX IF NOT EXISTS idx_locale ON translations (locale)",
    "CREATE INDEX IF NOT EXISTS idx_updated_at ON translations (updated_at DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS translation_tags (
        translation_id BIGINT NOT NULL REFERENCES translations (id) ON DELETE CASCADE,
        tag_id BIGINT NOT NULL REFERENCES tags (id),
        PRIMARY KEY (translation_id, tag_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_translation_tags_tag ON translation_tags (tag_id)",
];

const TRANSLATION_COLUMNS: &str =
    "id, translation_key, locale, content, created_at, updated_at";

// lower() follows the database ctype: a "C" ctype folds ASCII only.
const TEXT_FILTER: &str = "($1::text IS NULL OR strpos(lower(translation_key), lower($1)) > 0)
    AND ($2::text IS NULL OR strpos(lower(content), lower($2)) > 0)
    AND ($3::text IS NULL OR locale = $3)";

const TAG_FILTER: &str = "EXISTS (
        SELECT 1 FROM translation_tags tt
        JOIN tags g ON g.id = tt.tag_id
        WHERE tt.translation_id = translations.id AND g.name = ANY($1)
    )";

#[derive(Debug, sqlx::FromRow)]
struct TranslationRow {
    id: i64,
    translation_key: String,
    locale: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TranslationRow {
    fn into_translation(self, tags: BTreeSet<Tag>) -> Translation {
        Translation {
            id: self.id,
            key: self.translation_key,
            locale: self.locale,
            content: self.content,
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL backend over a shared connection pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the database settings from `config`.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.database_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        info!("✓ Database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn tag_ids(tags: &BTreeSet<Tag>) -> Vec<i64> {
    tags.iter().map(|t| t.id).collect()
}

async fn link_tags<'e, E: PgExecutor<'e>>(
    executor: E,
    translation_id: i64,
    tag_ids: &[i64],
) -> StoreResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO translation_tags (translation_id, tag_id)
         SELECT $1, tag_id FROM UNNEST($2::bigint[]) AS t(tag_id)",
    )
    .bind(translation_id)
    .bind(tag_ids)
    .execute(executor)
    .await?;
    Ok(())
}

/// Load tag sets for the given rows and assemble full translations, keeping row order.
async fn with_tags<'e, E: PgExecutor<'e>>(
    executor: E,
    rows: Vec<TranslationRow>,
) -> StoreResult<Vec<Translation>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let links = sqlx::query_as::<_, (i64, i64, String)>(
        "SELECT tt.translation_id, g.id, g.name
         FROM translation_tags tt
         JOIN tags g ON g.id = tt.tag_id
         WHERE tt.translation_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(executor)
    .await?;

    let mut by_translation: HashMap<i64, BTreeSet<Tag>> = HashMap::new();
    for (translation_id, id, name) in links {
        by_translation
            .entry(translation_id)
            .or_default()
            .insert(Tag { id, name });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let tags = by_translation.remove(&row.id).unwrap_or_default();
            row.into_translation(tags)
        })
        .collect())
}

#[async_trait]
impl Backend for PgBackend {
    async fn find_tags(&self, names: &[String]) -> StoreResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn insert_tags(&self, names: &[String]) -> StoreResult<TagInsert> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name) SELECT name FROM UNNEST($1::text[]) AS t(name)
             RETURNING id, name",
        )
        .bind(names)
        .fetch_all(&mut *tx)
        .await;

        match inserted {
            Ok(tags) => {
                tx.commit().await?;
                Ok(TagInsert::Inserted(tags))
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await?;
                Ok(TagInsert::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_tag_names(&self) -> StoreResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM tags ORDER BY name COLLATE \"C\"",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn fingerprint_exists(&self, key: &str, locale: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM translations WHERE translation_key = $1 AND locale = $2)",
        )
        .bind(key)
        .bind(locale)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_translation(
        &self,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Translation> {
        let mut tx = self.pool.begin().await?;

        // Serialise creates of the same (key, locale) until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text || chr(31) || $2::text))")
            .bind(&draft.key)
            .bind(&draft.locale)
            .execute(&mut *tx)
            .await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM translations WHERE translation_key = $1 AND locale = $2)",
        )
        .bind(&draft.key)
        .bind(&draft.locale)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(StoreError::DuplicateKey {
                key: draft.key.clone(),
                locale: draft.locale.clone(),
            });
        }

        let row = sqlx::query_as::<_, TranslationRow>(&format!(
            "INSERT INTO translations (translation_key, locale, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {}",
            TRANSLATION_COLUMNS
        ))
        .bind(&draft.key)
        .bind(&draft.locale)
        .bind(&draft.content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        link_tags(&mut *tx, row.id, &tag_ids(&draft.tags)).await?;
        tx.commit().await?;

        Ok(row.into_translation(draft.tags.clone()))
    }

    async fn update_translation(
        &self,
        id: i64,
        draft: &TranslationDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<UpdatedTranslation>> {
        let mut tx = self.pool.begin().await?;

        let previous_locale = sqlx::query_scalar::<_, String>(
            "SELECT locale FROM translations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(previous_locale) = previous_locale else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, TranslationRow>(&format!(
            "UPDATE translations
             SET translation_key = $2, locale = $3, content = $4,
                 updated_at = GREATEST($5, updated_at + INTERVAL '1 microsecond')
             WHERE id = $1
             RETURNING {}",
            TRANSLATION_COLUMNS
        ))
        .bind(id)
        .bind(&draft.key)
        .bind(&draft.locale)
        .bind(&draft.content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM translation_tags WHERE translation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_tags(&mut *tx, id, &tag_ids(&draft.tags)).await?;
        tx.commit().await?;

        Ok(Some(UpdatedTranslation {
            previous_locale,
            translation: row.into_translation(draft.tags.clone()),
        }))
    }

    async fn get_translation(&self, id: i64) -> StoreResult<Option<Translation>> {
        // One snapshot for the row and its tag links.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, TranslationRow>(&format!(
            "SELECT {} FROM translations WHERE id = $1",
            TRANSLATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let translation = match row {
            Some(row) => with_tags(&mut *tx, vec![row]).await?.pop(),
            None => None,
        };
        tx.commit().await?;
        Ok(translation)
    }

    async fn delete_translation(&self, id: i64) -> StoreResult<Option<String>> {
        // tag links go with the row (ON DELETE CASCADE)
        let locale = sqlx::query_scalar::<_, String>(
            "DELETE FROM translations WHERE id = $1 RETURNING locale",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(locale)
    }

    async fn insert_batch(
        &self,
        drafts: &[TranslationDraft],
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if drafts.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;

        // Reserve ids up front so tag links can be written without relying on RETURNING order.
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT nextval(pg_get_serial_sequence('translations', 'id'))
             FROM generate_series(1, $1)",
        )
        .bind(drafts.len() as i64)
        .fetch_all(&mut *tx)
        .await?;
        if ids.len() != drafts.len() {
            return Err(StoreError::Internal(format!(
                "reserved {} ids for {} translations",
                ids.len(),
                drafts.len()
            )));
        }

        let keys: Vec<&str> = drafts.iter().map(|d| d.key.as_str()).collect();
        let locales: Vec<&str> = drafts.iter().map(|d| d.locale.as_str()).collect();
        let contents: Vec<&str> = drafts.iter().map(|d| d.content.as_str()).collect();

        sqlx::query(
            "INSERT INTO translations (id, translation_key, locale, content, created_at, updated_at)
             SELECT id, translation_key, locale, content, $5, $5
             FROM UNNEST($1::bigint[], $2::text[], $3::text[], $4::text[])
                 AS t(id, translation_key, locale, content)",
        )
        .bind(&ids)
        .bind(&keys)
        .bind(&locales)
        .bind(&contents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut link_translations = Vec::new();
        let mut link_tag_ids = Vec::new();
        for (id, draft) in ids.iter().zip(drafts) {
            for tag in &draft.tags {
                link_translations.push(*id);
                link_tag_ids.push(tag.id);
            }
        }
        if !link_translations.is_empty() {
            sqlx::query(
                "INSERT INTO translation_tags (translation_id, tag_id)
                 SELECT * FROM UNNEST($1::bigint[], $2::bigint[])",
            )
            .bind(&link_translations)
            .bind(&link_tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(drafts.len() as u64)
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<(Vec<Translation>, u64)> {
        let limit = i64::from(query.page_size);
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        // Count and page come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let (total, rows) = if query.is_tag_mode() {
            let tags: Vec<&str> = query.tags.iter().map(String::as_str).collect();
            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM translations WHERE {}",
                TAG_FILTER
            ))
            .bind(&tags)
            .fetch_one(&mut *tx)
            .await?;
            let rows = sqlx::query_as::<_, TranslationRow>(&format!(
                "SELECT {} FROM translations WHERE {}
                 ORDER BY updated_at DESC, id DESC LIMIT $2 OFFSET $3",
                TRANSLATION_COLUMNS, TAG_FILTER
            ))
            .bind(&tags)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;
            (total, rows)
        } else {
            let total = sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM translations WHERE {}",
                TEXT_FILTER
            ))
            .bind(&query.key)
            .bind(&query.content)
            .bind(&query.locale)
            .fetch_one(&mut *tx)
            .await?;
            let rows = sqlx::query_as::<_, TranslationRow>(&format!(
                "SELECT {} FROM translations WHERE {}
                 ORDER BY updated_at DESC, id DESC LIMIT $4 OFFSET $5",
                TRANSLATION_COLUMNS, TEXT_FILTER
            ))
            .bind(&query.key)
            .bind(&query.content)
            .bind(&query.locale)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await?;
            (total, rows)
        };

        let items = with_tags(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok((items, total.max(0) as u64))
    }

    async fn locale_entries(&self, locale: &str) -> StoreResult<Vec<(String, String)>> {
        let entries = sqlx::query_as::<_, (String, String)>(
            "SELECT translation_key, content FROM translations
             WHERE locale = $1
             ORDER BY updated_at, id",
        )
        .bind(locale)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn list_locales(&self) -> StoreResult<Vec<String>> {
        let locales = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT locale FROM translations ORDER BY locale COLLATE \"C\"",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(locales)
    }

    async fn locale_stats(&self, locale: &str) -> StoreResult<LocaleStats> {
        let (count, last_updated) = sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
            "SELECT COUNT(*), MAX(updated_at) FROM translations WHERE locale = $1",
        )
        .bind(locale)
        .fetch_one(&self.pool)
        .await?;
        Ok(LocaleStats {
            locale: locale.to_string(),
            count: count.max(0) as u64,
            last_updated,
        })
    }
}
