//! Translation store and query engine.
//!
//! Localized strings keyed by (key, locale), tagged with shared labels,
//! searchable, exportable per locale through a write-invalidated cache, and
//! seedable in bulk for load tests.
//!
//! ```rust,ignore
//! use translation_store::{SearchParams, TranslationInput, TranslationService};
//!
//! let service = TranslationService::in_memory();
//! let saved = service
//!     .create_translation(&TranslationInput::new("button.save", "en", "Save", ["mobile"]))
//!     .await?;
//! let export = service.export_locale("en").await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod populate;
pub mod search;
pub mod service;
pub mod store;
pub mod tags;

pub use backend::{Backend, MemoryBackend, PgBackend, TagInsert};
pub use config::Config;
pub use error::{PopulateError, StoreError, StoreResult};
pub use export::{ExportCache, ExportMap};
pub use model::{LocaleStats, Tag, Translation, TranslationDraft, TranslationInput};
pub use populate::BulkPopulator;
pub use search::{Page, SearchEngine, SearchParams, SearchQuery};
pub use service::TranslationService;
pub use store::TranslationStore;
pub use tags::TagResolver;
