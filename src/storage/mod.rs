//! Deal record storage
//!
//! [`DealStore`] is the uniform contract over the configured document store.
//! Three implementations share identical observable behaviour: the
//! in-process [`MemoryDealStore`], the JSON-file [`FileDealStore`] and the
//! managed [`FirestoreDealStore`]. One is chosen at startup by
//! [`open_deal_store`]; there is no switching at runtime.
//!
//! Read-modify-write goes through [`DealStore::update`], which is atomic per
//! deal id on every backend.

pub mod file;
pub mod firestore;
pub mod memory;
pub mod value;

pub use file::FileDealStore;
pub use firestore::FirestoreDealStore;
pub use memory::MemoryDealStore;

use crate::artefacts::is_safe_segment;
use crate::config::{DealBackend, DealroomConfig};
use crate::deals::Deal;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Mutation applied inside [`DealStore::update`]. May be called more than
/// once when an optimistic write has to be retried.
pub type DealMutation<'a> = &'a (dyn Fn(&mut Deal) -> Result<()> + Send + Sync);

/// Persistent store for deal records
#[async_trait]
pub trait DealStore: Send + Sync {
    /// Fetch a deal, `NotFound` if absent
    async fn get(&self, id: &str) -> Result<Deal>;

    /// Upsert a deal (last write wins)
    async fn put(&self, deal: &Deal) -> Result<()>;

    /// All deals, oldest first
    async fn list(&self) -> Result<Vec<Deal>>;

    /// Remove a deal, `NotFound` if absent
    async fn delete(&self, id: &str) -> Result<()>;

    /// Create a deal, `Conflict` if the id is already taken
    async fn insert(&self, deal: &Deal) -> Result<()>;

    /// Atomically read, mutate and write one deal, returning the stored result.
    /// If `mutate` fails nothing is written and its error is returned.
    async fn update(&self, id: &str, mutate: DealMutation<'_>) -> Result<Deal>;

    /// Backend name (used in logs and diagnostics)
    fn name(&self) -> &str;
}

/// Reject ids a store cannot key on, before anything is written
pub(crate) fn validate_new_id(id: &str) -> Result<()> {
    if is_safe_segment(id) {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid deal id: {:?}", id)))
    }
}

/// Ids that could never have been stored are simply unknown
pub(crate) fn ensure_known_id(id: &str) -> Result<()> {
    if is_safe_segment(id) {
        Ok(())
    } else {
        Err(Error::deal_not_found(id))
    }
}

/// Apply a mutation to a copy of `current` and stamp the bookkeeping fields
pub(crate) fn apply_update(current: &Deal, mutate: DealMutation<'_>) -> Result<Deal> {
    let mut next = current.clone();
    mutate(&mut next)?;

    if next.id != current.id {
        return Err(Error::Internal(format!(
            "update of deal {} attempted to change its id",
            current.id
        )));
    }
    if next.status < current.status {
        return Err(Error::Internal(format!(
            "update of deal {} attempted to move status from {} back to {}",
            current.id, current.status, next.status
        )));
    }

    next.revision = current.revision + 1;
    next.updated_at = Utc::now();
    Ok(next)
}

/// Oldest first, id as tie-break
pub(crate) fn sort_deals(deals: &mut [Deal]) {
    deals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Build the configured deal store
pub async fn open_deal_store(config: &DealroomConfig) -> Result<Arc<dyn DealStore>> {
    let store: Arc<dyn DealStore> = match config.resolved_deal_backend() {
        DealBackend::Memory | DealBackend::Auto => Arc::new(MemoryDealStore::new()),
        DealBackend::File => {
            Arc::new(FileDealStore::new(config.storage.data_dir.join("deals")).await?)
        }
        DealBackend::Firestore => {
            let project = config.gcp.project_id.clone().ok_or_else(|| {
                Error::Config("storage.backend = \"firestore\" requires gcp.project_id".to_string())
            })?;
            let tokens =
                crate::gcp::token_source_from_config(&config.gcp, config.firestore.emulator)?;
            Arc::new(FirestoreDealStore::new(&config.firestore, &project, tokens))
        }
    };
    tracing::info!(backend = store.name(), "Deal store ready");
    Ok(store)
}
