//! Filesystem artefact store
//!
//! Directory layout:
//! ```text
//! <base>/
//! └── <deal-id>/
//!     ├── <kind>/<version>/<filename>
//!     └── <kind>/<version>/<filename>.meta.json
//! ```
//!
//! The sidecar records content type, size and SHA-256; reads verify the
//! digest before returning content.

use super::{is_safe_segment, sha256_hex, Artefact, ArtefactKind, ArtefactMeta, ArtefactRef, ArtefactStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

const META_SUFFIX: &str = ".meta.json";

/// Artefact store rooted at a local directory
pub struct FsArtefactStore {
    base_dir: PathBuf,
}

impl FsArtefactStore {
    /// Create the store, creating the base directory if needed
    pub async fn new(base_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    fn object_path(&self, reference: &ArtefactRef) -> PathBuf {
        self.base_dir
            .join(reference.deal_id())
            .join(reference.kind().key())
            .join(reference.version())
            .join(reference.filename())
    }

    fn meta_path(object: &Path) -> PathBuf {
        let mut name = object.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }
}

fn not_found(reference: &ArtefactRef) -> Error {
    Error::NotFound(format!("Artefact {} not found", reference))
}

#[async_trait]
impl ArtefactStore for FsArtefactStore {
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
        let path = self.object_path(&reference);

        if tokio::fs::try_exists(&path).await? {
            return Err(Error::Conflict(format!("Artefact {} already exists", reference)));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, &bytes).await?;
        tokio::fs::write(Self::meta_path(&path), serde_json::to_vec_pretty(&meta)?).await?;

        tracing::debug!(artefact = %reference, size = meta.size, "Stored artefact on disk");
        Ok(meta)
    }

    async fn get(&self, reference: &ArtefactRef) -> Result<Artefact> {
        let path = self.object_path(reference);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(reference)),
            Err(e) => return Err(e.into()),
        };

        let meta = match tokio::fs::read(Self::meta_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<ArtefactMeta>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ArtefactMeta::describe(reference.clone(), "application/octet-stream", &bytes)
            }
            Err(e) => return Err(e.into()),
        };

        if meta.sha256 != sha256_hex(&bytes) {
            return Err(Error::Storage(format!(
                "Artefact {} failed integrity check",
                reference
            )));
        }

        Ok(Artefact { meta, bytes })
    }

    async fn delete(&self, reference: &ArtefactRef) -> Result<()> {
        let path = self.object_path(reference);
        for target in [Self::meta_path(&path), path] {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn delete_deal(&self, deal_id: &str) -> Result<usize> {
        if !is_safe_segment(deal_id) {
            return Ok(0);
        }
        let deal_dir = self.base_dir.join(deal_id);
        let count = count_objects(&deal_dir).await?;
        match tokio::fs::remove_dir_all(&deal_dir).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Count stored objects (not sidecars) below a directory
async fn count_objects(dir: &Path) -> Result<usize> {
    let mut count = 0;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if !path.to_string_lossy().ends_with(META_SUFFIX) {
                count += 1;
            }
        }
    }
    Ok(count)
}
