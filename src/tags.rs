//! Get-or-create resolution of tag names.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{Backend, TagInsert};
use crate::error::{StoreError, StoreResult};
use crate::model::{normalize_tag_names, Tag};

/// Consecutive conflicting rounds with no new tag visible before giving up.
/// A conflict means another writer committed one of the missing names, and
/// tags are never deleted, so every honest conflict shrinks the missing set.
const MAX_STALLED_ROUNDS: u32 = 3;

#[derive(Clone)]
pub struct TagResolver {
    backend: Arc<dyn Backend>,
}

impl TagResolver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Normalise raw names, then resolve them.
    pub async fn resolve_names<S: AsRef<str> + Sync>(
        &self,
        names: &[S],
    ) -> StoreResult<BTreeSet<Tag>> {
        let names = normalize_tag_names(names)?;
        self.resolve(&names).await
    }

    /// Map names to tags, creating the missing ones.
    ///
    /// When a concurrent caller commits one of our missing names first, the
    /// insert reports a conflict and we go around again, picking up the
    /// winner's row on the next read.
    pub async fn resolve(&self, names: &BTreeSet<String>) -> StoreResult<BTreeSet<Tag>> {
        if names.is_empty() {
            return Ok(BTreeSet::new());
        }
        let wanted: Vec<String> = names.iter().cloned().collect();
        let mut previous_missing = usize::MAX;
        let mut stalled = 0;

        loop {
            let mut resolved: BTreeSet<Tag> =
                self.backend.find_tags(&wanted).await?.into_iter().collect();

            let missing: Vec<String> = wanted
                .iter()
                .filter(|name| !resolved.iter().any(|t| &t.name == *name))
                .cloned()
                .collect();
            if missing.is_empty() {
                return Ok(resolved);
            }

            if missing.len() < previous_missing {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= MAX_STALLED_ROUNDS {
                    return Err(StoreError::Internal(format!(
                        "tag resolution made no progress after {} conflicting rounds",
                        MAX_STALLED_ROUNDS
                    )));
                }
            }
            previous_missing = missing.len();

            match self.backend.insert_tags(&missing).await? {
                TagInsert::Inserted(created) => {
                    debug!("Created {} new tags: {:?}", created.len(), missing);
                    resolved.extend(created);
                    return Ok(resolved);
                }
                TagInsert::Conflict => {
                    warn!(
                        "Tag creation raced with another writer ({} names still missing), re-reading",
                        missing.len()
                    );
                }
            }
        }
    }
}
