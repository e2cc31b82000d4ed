//! Error types returned by the translation core.

use thiserror::Error;

/// Failures surfaced to callers of the core operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before any persistence attempt.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A live translation already holds this (key, locale) pair.
    #[error("translation already exists for key: {key} and locale: {locale}")]
    DuplicateKey { key: String, locale: String },

    #[error("translation not found with id: {0}")]
    NotFound(i64),

    /// Persistence layer failure, passed through unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Backend invariant broken (e.g. tag resolution did not converge).
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bulk population stopped part way; earlier chunks remain committed.
#[derive(Debug, Error)]
#[error("population stopped after {committed} records: {source}")]
pub struct PopulateError {
    pub committed: u64,
    #[source]
    pub source: StoreError,
}
