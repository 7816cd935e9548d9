//! In-process deal store
//!
//! Fallback used when no managed database is configured. The write lock is
//! held across the whole of [`DealStore::update`], so concurrent handlers
//! never lose each other's changes.

use super::{apply_update, ensure_known_id, sort_deals, validate_new_id, DealMutation, DealStore};
use crate::deals::Deal;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory deal store
pub struct MemoryDealStore {
    deals: Arc<RwLock<HashMap<String, Deal>>>,
}

impl MemoryDealStore {
    pub fn new() -> Self {
        Self {
            deals: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryDealStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
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
        self.deals
            .write()
            .await
            .insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Deal>> {
        let mut deals: Vec<Deal> = self.deals.read().await.values().cloned().collect();
        sort_deals(&mut deals);
        Ok(deals)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        ensure_known_id(id)?;
        self.deals
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::deal_not_found(id))
    }

    async fn insert(&self, deal: &Deal) -> Result<()> {
        validate_new_id(&deal.id)?;
        let mut deals = self.deals.write().await;
        if deals.contains_key(&deal.id) {
            return Err(Error::Conflict(format!("Deal {} already exists", deal.id)));
        }
        deals.insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn update(&self, id: &str, mutate: DealMutation<'_>) -> Result<Deal> {
        ensure_known_id(id)?;
        let mut deals = self.deals.write().await;
        let current = deals.get(id).ok_or_else(|| Error::deal_not_found(id))?;
        let next = apply_update(current, mutate)?;
        deals.insert(id.to_string(), next.clone());
        Ok(next)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
