//! Google Cloud Storage artefact store
//!
//! Objects are written through the JSON API media upload with
//! `ifGenerationMatch=0`, so an artefact reference can never be overwritten.
//! Object names are the artefact references themselves, which keeps every
//! object of a deal under the `<deal_id>/` prefix for cascade deletes.

use super::{Artefact, ArtefactKind, ArtefactMeta, ArtefactRef, ArtefactStore};
use crate::error::{Error, Result};
use crate::gcp::{ApiFailure, TokenSource};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;

const LIST_PAGE_SIZE: &str = "500";

/// Artefact store backed by a Cloud Storage bucket
pub struct GcsArtefactStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

impl GcsArtefactStore {
    pub fn new(endpoint: &str, bucket: String, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            tokens,
        }
    }

    fn bucket_url(&self, upload: bool) -> Result<Url> {
        let prefix = if upload { "/upload" } else { "" };
        let raw = format!("{}{}/storage/v1/b", self.endpoint, prefix);
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::Config(format!("Invalid storage endpoint {}: {}", raw, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid storage endpoint {}", raw)))?
            .push(&self.bucket)
            .push("o");
        Ok(url)
    }

    /// URL of a single object; the name is encoded as one path segment
    fn object_url(&self, name: &str) -> Result<Url> {
        let mut url = self.bucket_url(false)?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Invalid storage endpoint".to_string()))?
            .push(name);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.tokens.token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Cloud Storage unreachable: {}", e)))
    }

    async fn list_names(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.bucket_url(false)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("maxResults", LIST_PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.send(self.client.get(url)).await?;
            if !response.status().is_success() {
                let failure = ApiFailure::from_response(response).await;
                return Err(Error::Storage(format!("Cloud Storage list failed: {}", failure)));
            }
            let page: ObjectList = response.json().await?;
            names.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl ArtefactStore for GcsArtefactStore {
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

        let mut url = self.bucket_url(true)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", reference.as_str())
            .append_pair("ifGenerationMatch", "0");

        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self.send(request).await?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!(artefact = %reference, size = meta.size, "Uploaded artefact");
                Ok(meta)
            }
            StatusCode::PRECONDITION_FAILED => Err(Error::Conflict(format!(
                "Artefact {} already exists",
                reference
            ))),
            _ => {
                let failure = ApiFailure::from_response(response).await;
                Err(Error::Storage(format!("Cloud Storage upload failed: {}", failure)))
            }
        }
    }

    async fn get(&self, reference: &ArtefactRef) -> Result<Artefact> {
        let mut url = self.object_url(reference.as_str())?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send(self.client.get(url)).await?;
        match response.status() {
            s if s.is_success() => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = response.bytes().await?;
                Ok(Artefact {
                    meta: ArtefactMeta::describe(reference.clone(), &content_type, &bytes),
                    bytes,
                })
            }
            StatusCode::NOT_FOUND => {
                Err(Error::NotFound(format!("Artefact {} not found", reference)))
            }
            _ => {
                let failure = ApiFailure::from_response(response).await;
                Err(Error::Storage(format!("Cloud Storage download failed: {}", failure)))
            }
        }
    }

    async fn delete(&self, reference: &ArtefactRef) -> Result<()> {
        let url = self.object_url(reference.as_str())?;
        let response = self.send(self.client.delete(url)).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => {
                let failure = ApiFailure::from_response(response).await;
                Err(Error::Storage(format!("Cloud Storage delete failed: {}", failure)))
            }
        }
    }

    async fn delete_deal(&self, deal_id: &str) -> Result<usize> {
        let names = self.list_names(&format!("{}/", deal_id)).await?;
        let mut removed = 0;
        for name in names {
            match ArtefactRef::parse(&name) {
                Ok(reference) => {
                    self.delete(&reference).await?;
                    removed += 1;
                }
                Err(_) => tracing::warn!(object = %name, "Skipping foreign object under deal prefix"),
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
