//! Artefact store: immutable blobs owned by deals
//!
//! Original uploads and generated memo documents are stored as artefacts
//! identified by `(deal_id, kind, version)`. Every write allocates a fresh
//! version, so an [`ArtefactRef`] always names exactly one immutable object.
//! The reference is opaque to callers and is persisted inside the deal record.
//!
//! Backends: [`MemoryArtefactStore`], [`FsArtefactStore`] and
//! [`GcsArtefactStore`], selected once at startup by [`open_artefact_store`].

pub mod fs;
pub mod gcs;
pub mod memory;

pub use fs::FsArtefactStore;
pub use gcs::GcsArtefactStore;
pub use memory::MemoryArtefactStore;

use crate::config::{ArtefactBackend, DealroomConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// What an artefact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactKind {
    OriginalUpload,
    MemoDocument,
}

impl ArtefactKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::OriginalUpload => "original_upload",
            Self::MemoDocument => "memo_document",
        }
    }
}

impl std::fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for ArtefactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "original_upload" => Ok(Self::OriginalUpload),
            "memo_document" => Ok(Self::MemoDocument),
            other => Err(Error::Validation(format!("unknown artefact kind: {}", other))),
        }
    }
}

/// Opaque artefact reference: `<deal_id>/<kind>/<version>/<filename>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtefactRef(String);

impl ArtefactRef {
    /// Allocate a reference with a fresh version
    pub fn allocate(deal_id: &str, kind: ArtefactKind, filename: &str) -> Result<Self> {
        if !is_safe_segment(deal_id) {
            return Err(Error::Validation(format!("invalid deal id: {:?}", deal_id)));
        }
        let version = uuid::Uuid::new_v4().simple().to_string();
        Ok(Self(format!(
            "{}/{}/{}/{}",
            deal_id,
            kind.key(),
            version,
            sanitize_filename(filename)
        )))
    }

    /// Parse and validate a stored reference
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('/').collect();
        let valid = parts.len() == 4
            && parts.iter().all(|p| is_safe_segment(p))
            && parts[1].parse::<ArtefactKind>().is_ok();
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::NotFound(format!("Artefact {} not found", raw)))
        }
    }

    fn part(&self, index: usize) -> &str {
        self.0.split('/').nth(index).unwrap_or_default()
    }

    pub fn deal_id(&self) -> &str {
        self.part(0)
    }

    pub fn kind(&self) -> ArtefactKind {
        self.part(1).parse().unwrap_or(ArtefactKind::OriginalUpload)
    }

    pub fn version(&self) -> &str {
        self.part(2)
    }

    pub fn filename(&self) -> &str {
        self.part(3)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtefactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArtefactRef {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<ArtefactRef> for String {
    fn from(r: ArtefactRef) -> Self {
        r.0
    }
}

/// Metadata recorded for every stored artefact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactMeta {
    pub reference: ArtefactRef,
    pub content_type: String,
    pub size: u64,
    /// Hex SHA-256 of the content
    pub sha256: String,
}

impl ArtefactMeta {
    pub fn describe(reference: ArtefactRef, content_type: &str, bytes: &[u8]) -> Self {
        Self {
            reference,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        }
    }
}

/// Artefact content plus metadata
#[derive(Debug, Clone)]
pub struct Artefact {
    pub meta: ArtefactMeta,
    pub bytes: Bytes,
}

/// Blob storage for deal artefacts
#[async_trait]
pub trait ArtefactStore: Send + Sync {
    /// Store a new immutable artefact and return its metadata
    async fn put(
        &self,
        deal_id: &str,
        kind: ArtefactKind,
        filename: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> Result<ArtefactMeta>;

    /// Fetch an artefact, `NotFound` if absent
    async fn get(&self, reference: &ArtefactRef) -> Result<Artefact>;

    /// Remove one artefact; removing a missing artefact is not an error
    async fn delete(&self, reference: &ArtefactRef) -> Result<()>;

    /// Remove every artefact of a deal, returning how many were removed
    async fn delete_deal(&self, deal_id: &str) -> Result<usize>;

    /// Backend name (used in logs and diagnostics)
    fn name(&self) -> &str;
}

/// Build the configured artefact store
pub async fn open_artefact_store(config: &DealroomConfig) -> Result<Arc<dyn ArtefactStore>> {
    let backend = config.resolved_artefact_backend();
    let store: Arc<dyn ArtefactStore> = match backend {
        ArtefactBackend::Memory | ArtefactBackend::Auto => Arc::new(MemoryArtefactStore::new()),
        ArtefactBackend::File => Arc::new(
            FsArtefactStore::new(config.storage.data_dir.join("artefacts")).await?,
        ),
        ArtefactBackend::Gcs => {
            let bucket = config.artefacts.bucket.clone().ok_or_else(|| {
                Error::Config("artefacts.backend = \"gcs\" requires a bucket".to_string())
            })?;
            let tokens =
                crate::gcp::token_source_from_config(&config.gcp, config.artefacts.emulator)?;
            Arc::new(GcsArtefactStore::new(
                &config.artefacts.endpoint,
                bucket,
                tokens,
            ))
        }
    };
    tracing::info!(backend = store.name(), "Artefact store ready");
    Ok(store)
}

/// Keep filenames to a portable character set; never empty
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Hex-encoded SHA-256
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Characters allowed in ids and reference segments
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_fresh_versions() {
        let a = ArtefactRef::allocate("deal-1", ArtefactKind::MemoDocument, "memo.md").unwrap();
        let b = ArtefactRef::allocate("deal-1", ArtefactKind::MemoDocument, "memo.md").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.deal_id(), "deal-1");
        assert_eq!(a.kind(), ArtefactKind::MemoDocument);
        assert_eq!(a.filename(), "memo.md");
        assert_eq!(a.version().len(), 32);
    }

    #[test]
    fn test_allocate_rejects_unsafe_deal_id() {
        assert!(ArtefactRef::allocate("../etc", ArtefactKind::OriginalUpload, "x").is_err());
        assert!(ArtefactRef::allocate("", ArtefactKind::OriginalUpload, "x").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ArtefactRef::parse("deal-1/memo_document/v1/memo.md").is_ok());
        assert!(ArtefactRef::parse("deal-1/unknown/v1/memo.md").is_err());
        assert!(ArtefactRef::parse("deal-1/memo_document/../memo.md").is_err());
        assert!(ArtefactRef::parse("deal-1/memo_document/memo.md").is_err());
    }

    #[test]
    fn test_ref_serializes_as_string() {
        let r = ArtefactRef::parse("deal-1/original_upload/abc/pitch.pdf").unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"deal-1/original_upload/abc/pitch.pdf\"");
        let back: ArtefactRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("pitch deck (final).pdf"), "pitch_deck__final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\deck.pdf"), "deck.pdf");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(".."), "file");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
