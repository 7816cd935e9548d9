//! Firestore deal store (REST v1 documents API)
//!
//! Each deal is one document in the configured collection, keyed by deal id.
//! Updates are optimistic: the document is read together with its
//! `updateTime` and written back with a `currentDocument.updateTime`
//! precondition. A lost race is retried up to `max_update_attempts` times and
//! then reported as [`Error::Conflict`].

use super::value::{decode_fields, encode_fields};
use super::{apply_update, ensure_known_id, sort_deals, validate_new_id, DealMutation, DealStore};
use crate::config::FirestoreConfig;
use crate::deals::Deal;
use crate::error::{Error, Result};
use crate::gcp::{ApiFailure, TokenSource};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const LIST_PAGE_SIZE: &str = "100";

/// Deal store backed by a Firestore collection
pub struct FirestoreDealStore {
    client: reqwest::Client,
    /// `<endpoint>/v1/projects/<p>/databases/<d>/documents/<collection>`
    collection_url: String,
    tokens: Arc<dyn TokenSource>,
    max_update_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPage {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FirestoreDealStore {
    pub fn new(config: &FirestoreConfig, project_id: &str, tokens: Arc<dyn TokenSource>) -> Self {
        let collection_url = format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            config.endpoint.trim_end_matches('/'),
            project_id,
            config.database,
            config.collection
        );
        Self {
            client: reqwest::Client::new(),
            collection_url,
            tokens,
            max_update_attempts: config.max_update_attempts.max(1),
        }
    }

    fn document_url(&self, id: &str) -> Result<String> {
        ensure_known_id(id)?;
        Ok(format!("{}/{}", self.collection_url, id))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.tokens.token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Firestore unreachable: {}", e)))
    }

    fn body_for(deal: &Deal) -> Result<Value> {
        match serde_json::to_value(deal)? {
            Value::Object(object) => Ok(json!({ "fields": encode_fields(&object) })),
            _ => Err(Error::Internal("deal did not serialize to an object".to_string())),
        }
    }

    fn decode(document: &Document) -> Result<Deal> {
        let object = decode_fields(&document.fields)?;
        serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::Storage(format!("Malformed deal document: {}", e)))
    }

    /// Read a deal together with its `updateTime`
    async fn fetch(&self, id: &str) -> Result<(Deal, String)> {
        let response = self.send(self.client.get(self.document_url(id)?)).await?;
        match response.status() {
            s if s.is_success() => {
                let document: Document = response.json().await?;
                let update_time = document.update_time.clone().ok_or_else(|| {
                    Error::Storage(format!("Firestore document {} has no updateTime", id))
                })?;
                Ok((Self::decode(&document)?, update_time))
            }
            StatusCode::NOT_FOUND => Err(Error::deal_not_found(id)),
            _ => Err(storage_failure("read", ApiFailure::from_response(response).await)),
        }
    }
}

fn storage_failure(action: &str, failure: ApiFailure) -> Error {
    Error::Storage(format!("Firestore {} failed: {}", action, failure))
}

fn is_precondition_race(failure: &ApiFailure) -> bool {
    failure.is("FAILED_PRECONDITION")
        || failure.is("ABORTED")
        || failure.http_status == StatusCode::CONFLICT
}

#[async_trait]
impl DealStore for FirestoreDealStore {
    async fn get(&self, id: &str) -> Result<Deal> {
        self.fetch(id).await.map(|(deal, _)| deal)
    }

    async fn put(&self, deal: &Deal) -> Result<()> {
        validate_new_id(&deal.id)?;
        let request = self
            .client
            .patch(self.document_url(&deal.id)?)
            .json(&Self::body_for(deal)?);
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(storage_failure("write", ApiFailure::from_response(response).await))
        }
    }

    async fn list(&self) -> Result<Vec<Deal>> {
        let mut deals = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let response = self
                .send(self.client.get(&self.collection_url).query(&query))
                .await?;
            if !response.status().is_success() {
                return Err(storage_failure("list", ApiFailure::from_response(response).await));
            }

            let page: DocumentPage = response.json().await?;
            for document in &page.documents {
                deals.push(Self::decode(document)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        sort_deals(&mut deals);
        Ok(deals)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.document_url(id)?)
            .query(&[("currentDocument.exists", "true")]);
        let response = self.send(request).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::deal_not_found(id)),
            _ => Err(storage_failure("delete", ApiFailure::from_response(response).await)),
        }
    }

    async fn insert(&self, deal: &Deal) -> Result<()> {
        validate_new_id(&deal.id)?;
        let request = self
            .client
            .post(&self.collection_url)
            .query(&[("documentId", deal.id.as_str())])
            .json(&Self::body_for(deal)?);
        let response = self.send(request).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(Error::Conflict(format!("Deal {} already exists", deal.id))),
            _ => Err(storage_failure("create", ApiFailure::from_response(response).await)),
        }
    }

    async fn update(&self, id: &str, mutate: DealMutation<'_>) -> Result<Deal> {
        for attempt in 1..=self.max_update_attempts {
            let (current, update_time) = self.fetch(id).await?;
            let next = apply_update(&current, mutate)?;

            let request = self
                .client
                .patch(self.document_url(id)?)
                .query(&[("currentDocument.updateTime", update_time.as_str())])
                .json(&Self::body_for(&next)?);
            let response = self.send(request).await?;

            if response.status().is_success() {
                return Ok(next);
            }
            if response.status() == StatusCode::NOT_FOUND {
                return Err(Error::deal_not_found(id));
            }

            let failure = ApiFailure::from_response(response).await;
            if !is_precondition_race(&failure) {
                return Err(storage_failure("update", failure));
            }
            tracing::warn!(deal_id = id, attempt, "Concurrent update detected, retrying");
        }

        Err(Error::Conflict(format!(
            "Deal {} was modified concurrently {} times; giving up",
            id, self.max_update_attempts
        )))
    }

    fn name(&self) -> &str {
        "firestore"
    }
}
