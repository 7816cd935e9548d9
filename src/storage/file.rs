//! JSON-file deal store
//!
//! One pretty-printed document per deal under `<dir>/<deal_id>.json`. All
//! documents are loaded at startup and served from memory; writes go to a
//! temporary file that is renamed into place while the write lock is held.

use super::{apply_update, ensure_known_id, sort_deals, validate_new_id, DealMutation, DealStore};
use crate::deals::Deal;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// File-backed deal store
pub struct FileDealStore {
    dir: PathBuf,
    deals: Arc<RwLock<HashMap<String, Deal>>>,
}

impl FileDealStore {
    /// Open the store, loading every deal document from `dir`
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let deals = Self::load_from_disk(&dir).await?;
        tracing::debug!(dir = %dir.display(), count = deals.len(), "Loaded deal documents");
        Ok(Self {
            dir,
            deals: Arc::new(RwLock::new(deals)),
        })
    }

    async fn load_from_disk(dir: &Path) -> Result<HashMap<String, Deal>> {
        let mut deals = HashMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Deal>(&raw) {
                Ok(deal) => {
                    deals.insert(deal.id.clone(), deal);
                }
                Err(e) => tracing::warn!("Failed to parse deal {}: {}", path.display(), e),
            }
        }
        Ok(deals)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        ensure_known_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn persist(&self, deal: &Deal) -> Result<()> {
        let path = self.path_for(&deal.id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(deal)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DealStore for FileDealStore {
    async fn get(&self, id: &str) -> Result<Deal> {
        ensure_known_id(id)?;
        self.deals
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::deal_not_found(id))
    }

    async fn put(&self, deal: &Deal) -> Result<()> {
        validate_new_id(&deal.id)?;
        let mut deals = self.deals.write().await;
        self.persist(deal).await?;
        deals.insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Deal>> {
        let mut deals: Vec<Deal> = self.deals.read().await.values().cloned().collect();
        sort_deals(&mut deals);
        Ok(deals)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut deals = self.deals.write().await;
        if !deals.contains_key(id) {
            return Err(Error::deal_not_found(id));
        }
        match tokio::fs::remove_file(self.path_for(id)?).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        deals.remove(id);
        Ok(())
    }

    async fn insert(&self, deal: &Deal) -> Result<()> {
        validate_new_id(&deal.id)?;
        let mut deals = self.deals.write().await;
        if deals.contains_key(&deal.id) {
            return Err(Error::Conflict(format!("Deal {} already exists", deal.id)));
        }
        self.persist(deal).await?;
        deals.insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn update(&self, id: &str, mutate: DealMutation<'_>) -> Result<Deal> {
        ensure_known_id(id)?;
        let mut deals = self.deals.write().await;
        let current = deals.get(id).ok_or_else(|| Error::deal_not_found(id))?;
        let next = apply_update(current, mutate)?;
        self.persist(&next).await?;
        deals.insert(id.to_string(), next.clone());
        Ok(next)
    }

    fn name(&self) -> &str {
        "file"
    }
}
