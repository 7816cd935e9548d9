//! In-memory artefact store
//!
//! Used when no bucket is configured. Contents are lost on restart.

use super::{Artefact, ArtefactKind, ArtefactMeta, ArtefactRef, ArtefactStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store for deal artefacts
pub struct MemoryArtefactStore {
    objects: Arc<RwLock<HashMap<ArtefactRef, Artefact>>>,
}

impl MemoryArtefactStore {
    /// Create a new empty artefact store
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored artefacts
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryArtefactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtefactStore for MemoryArtefactStore {
    async fn put(
        &self,
        deal_id: &str,
        kind: ArtefactKind,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<ArtefactMeta> {
        let reference = ArtefactRef::allocate(deal_id, kind, filename)?;
        let meta = ArtefactMeta::describe(reference.clone(), content_type, &bytes);

        let mut objects = self.objects.write().await;
        if objects.contains_key(&reference) {
            return Err(Error::Conflict(format!("Artefact {} already exists", reference)));
        }
        objects.insert(
            reference,
            Artefact {
                meta: meta.clone(),
                bytes,
            },
        );
        Ok(meta)
    }

    async fn get(&self, reference: &ArtefactRef) -> Result<Artefact> {
        self.objects
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Artefact {} not found", reference)))
    }

    async fn delete(&self, reference: &ArtefactRef) -> Result<()> {
        self.objects.write().await.remove(reference);
        Ok(())
    }

    async fn delete_deal(&self, deal_id: &str) -> Result<usize> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|reference, _| reference.deal_id() != deal_id);
        Ok(before - objects.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
