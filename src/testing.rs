//! Local stand-ins for the Google APIs used in tests
//!
//! Each mock is a small axum server bound to an ephemeral port that speaks
//! enough of the real wire format for the store clients: Firestore documents
//! (create, get, patch with `updateTime` preconditions, delete, paged list)
//! and Cloud Storage objects (media upload, download, delete, paged list).

use crate::config::FirestoreConfig;
use crate::gcp::StaticTokenSource;
use crate::storage::FirestoreDealStore;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn google_error(status: StatusCode, canonical: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": canonical,
                "status": canonical,
            }
        })),
    )
        .into_response()
}

/// Take one unit from a counter if it is non-zero
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn page_bounds(query: &HashMap<String, String>, page_size: usize, total: usize) -> (usize, usize) {
    let start = query
        .get("pageToken")
        .and_then(|t| t.parse::<usize>().ok())
        .unwrap_or(0)
        .min(total);
    let size = if page_size == 0 { total.max(1) } else { page_size };
    (start, (start + size).min(total))
}

// ---------------------------------------------------------------------------
// Firestore
// ---------------------------------------------------------------------------

struct StoredDocument {
    fields: Value,
    update_time: String,
}

#[derive(Default)]
struct FirestoreState {
    documents: RwLock<BTreeMap<String, StoredDocument>>,
    clock: AtomicU64,
    fail_updates: AtomicUsize,
    page_size: AtomicUsize,
}

impl FirestoreState {
    fn tick(&self) -> String {
        let n = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        format!("2025-01-01T00:00:00.{:09}Z", n)
    }

    fn render(id: &str, doc: &StoredDocument) -> Value {
        json!({
            "name": format!("projects/demo/databases/(default)/documents/deals/{}", id),
            "fields": doc.fields,
            "createTime": "2025-01-01T00:00:00Z",
            "updateTime": doc.update_time,
        })
    }
}

/// In-process Firestore documents API
pub struct MockFirestore {
    addr: SocketAddr,
    state: Arc<FirestoreState>,
}

impl MockFirestore {
    pub async fn start() -> Self {
        let state = Arc::new(FirestoreState::default());
        let app = Router::new()
            .route(
                "/v1/projects/:project/databases/:database/documents/:collection",
                get(firestore_list).post(firestore_create),
            )
            .route(
                "/v1/projects/:project/databases/:database/documents/:collection/:id",
                get(firestore_get)
                    .patch(firestore_patch)
                    .delete(firestore_delete),
            )
            .with_state(state.clone());
        let addr = spawn(app).await;
        Self { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Store client pointed at this mock
    pub fn store(&self) -> FirestoreDealStore {
        let config = FirestoreConfig {
            endpoint: self.endpoint(),
            emulator: true,
            ..FirestoreConfig::default()
        };
        FirestoreDealStore::new(&config, "demo", Arc::new(StaticTokenSource::emulator()))
    }

    /// Reject the next `n` precondition-guarded writes as stale
    pub fn fail_next_updates(&self, n: usize) {
        self.state.fail_updates.store(n, Ordering::SeqCst);
    }

    pub fn set_page_size(&self, n: usize) {
        self.state.page_size.store(n, Ordering::SeqCst);
    }

    /// Typed `fields` of a stored document
    pub async fn raw_document(&self, id: &str) -> Option<Value> {
        self.state
            .documents
            .read()
            .await
            .get(id)
            .map(|doc| doc.fields.clone())
    }
}

type CollectionPath = Path<(String, String, String)>;
type DocumentPath = Path<(String, String, String, String)>;

async fn firestore_list(
    State(state): State<Arc<FirestoreState>>,
    _path: CollectionPath,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let documents = state.documents.read().await;
    let (start, end) = page_bounds(&query, state.page_size.load(Ordering::SeqCst), documents.len());
    let page: Vec<Value> = documents
        .iter()
        .skip(start)
        .take(end - start)
        .map(|(id, doc)| FirestoreState::render(id, doc))
        .collect();
    let mut body = json!({ "documents": page });
    if end < documents.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    Json(body).into_response()
}

async fn firestore_create(
    State(state): State<Arc<FirestoreState>>,
    _path: CollectionPath,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let Some(id) = query.get("documentId").cloned() else {
        return google_error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT");
    };
    let mut documents = state.documents.write().await;
    if documents.contains_key(&id) {
        return google_error(StatusCode::CONFLICT, "ALREADY_EXISTS");
    }
    let doc = StoredDocument {
        fields: body["fields"].clone(),
        update_time: state.tick(),
    };
    let rendered = FirestoreState::render(&id, &doc);
    documents.insert(id, doc);
    Json(rendered).into_response()
}

async fn firestore_get(
    State(state): State<Arc<FirestoreState>>,
    Path((_, _, _, id)): DocumentPath,
) -> Response {
    match state.documents.read().await.get(&id) {
        Some(doc) => Json(FirestoreState::render(&id, doc)).into_response(),
        None => google_error(StatusCode::NOT_FOUND, "NOT_FOUND"),
    }
}

async fn firestore_patch(
    State(state): State<Arc<FirestoreState>>,
    Path((_, _, _, id)): DocumentPath,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut documents = state.documents.write().await;
    if let Some(expected) = query.get("currentDocument.updateTime") {
        if take_one(&state.fail_updates) {
            return google_error(StatusCode::BAD_REQUEST, "FAILED_PRECONDITION");
        }
        match documents.get(&id) {
            None => return google_error(StatusCode::NOT_FOUND, "NOT_FOUND"),
            Some(doc) if &doc.update_time != expected => {
                return google_error(StatusCode::BAD_REQUEST, "FAILED_PRECONDITION")
            }
            Some(_) => {}
        }
    }
    let doc = StoredDocument {
        fields: body["fields"].clone(),
        update_time: state.tick(),
    };
    let rendered = FirestoreState::render(&id, &doc);
    documents.insert(id, doc);
    Json(rendered).into_response()
}

async fn firestore_delete(
    State(state): State<Arc<FirestoreState>>,
    Path((_, _, _, id)): DocumentPath,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let removed = state.documents.write().await.remove(&id);
    let must_exist = query.get("currentDocument.exists").map(String::as_str) == Some("true");
    if removed.is_none() && must_exist {
        return google_error(StatusCode::NOT_FOUND, "NOT_FOUND");
    }
    Json(json!({})).into_response()
}

// ---------------------------------------------------------------------------
// Cloud Storage
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GcsState {
    objects: RwLock<BTreeMap<String, (String, Bytes)>>,
    last_authorization: RwLock<Option<String>>,
    page_size: AtomicUsize,
}

/// In-process Cloud Storage JSON API
pub struct MockGcs {
    addr: SocketAddr,
    state: Arc<GcsState>,
}

impl MockGcs {
    pub async fn start() -> Self {
        let state = Arc::new(GcsState::default());
        let app = Router::new()
            .route("/upload/storage/v1/b/:bucket/o", post(gcs_upload))
            .route("/storage/v1/b/:bucket/o", get(gcs_list))
            .route(
                "/storage/v1/b/:bucket/o/:object",
                get(gcs_download).delete(gcs_delete),
            )
            .with_state(state.clone());
        let addr = spawn(app).await;
        Self { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_page_size(&self, n: usize) {
        self.state.page_size.store(n, Ordering::SeqCst);
    }

    pub async fn object_names(&self) -> Vec<String> {
        self.state.objects.read().await.keys().cloned().collect()
    }

    pub async fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.read().await.clone()
    }
}

async fn remember_auth(state: &GcsState, headers: &HeaderMap) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_authorization.write().await = auth;
}

async fn gcs_upload(
    State(state): State<Arc<GcsState>>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    remember_auth(&state, &headers).await;
    let Some(name) = query.get("name").cloned() else {
        return google_error(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT");
    };
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut objects = state.objects.write().await;
    if objects.contains_key(&name) && query.get("ifGenerationMatch").map(String::as_str) == Some("0") {
        return google_error(StatusCode::PRECONDITION_FAILED, "FAILED_PRECONDITION");
    }
    let size = body.len();
    objects.insert(name.clone(), (content_type.clone(), body));
    Json(json!({
        "bucket": bucket,
        "name": name,
        "contentType": content_type,
        "size": size.to_string(),
    }))
    .into_response()
}

async fn gcs_list(
    State(state): State<Arc<GcsState>>,
    Path(_bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let prefix = query.get("prefix").cloned().unwrap_or_default();
    let objects = state.objects.read().await;
    let matching: Vec<&String> = objects.keys().filter(|k| k.starts_with(&prefix)).collect();
    let (start, end) = page_bounds(&query, state.page_size.load(Ordering::SeqCst), matching.len());
    let items: Vec<Value> = matching[start..end]
        .iter()
        .map(|name| json!({ "name": name }))
        .collect();
    let mut body = json!({ "kind": "storage#objects", "items": items });
    if end < matching.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    Json(body).into_response()
}

async fn gcs_download(
    State(state): State<Arc<GcsState>>,
    Path((_bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    remember_auth(&state, &headers).await;
    match state.objects.read().await.get(&object) {
        Some((content_type, bytes)) => (
            [(header::CONTENT_TYPE, content_type.clone())],
            bytes.clone(),
        )
            .into_response(),
        None => google_error(StatusCode::NOT_FOUND, "NOT_FOUND"),
    }
}

async fn gcs_delete(
    State(state): State<Arc<GcsState>>,
    Path((_bucket, object)): Path<(String, String)>,
) -> Response {
    match state.objects.write().await.remove(&object) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => google_error(StatusCode::NOT_FOUND, "NOT_FOUND"),
    }
}
