//! Dealroom configuration management
//!
//! Configuration is read once at startup: an optional TOML file is
//! deserialized into [`DealroomConfig`], then environment variables are
//! overlaid with [`DealroomConfig::apply_env`]. The resulting struct is passed
//! by reference to the component factories; nothing reads the environment
//! after that point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main Dealroom configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DealroomConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Google Cloud project and credentials
    pub gcp: GcpConfig,

    /// Deal record storage
    pub storage: StorageConfig,

    /// Firestore document database settings
    pub firestore: FirestoreConfig,

    /// Artefact (blob) storage
    pub artefacts: ArtefactConfig,

    /// Memo generator
    pub generator: GeneratorConfig,

    /// Founder invites
    pub invites: InviteConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,

    /// Maximum accepted request body, in bytes (uploads)
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18800,
            cors_origins: Vec::new(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Google Cloud project and credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Project id (`GCP_PROJECT_ID`)
    pub project_id: Option<String>,

    /// Service-account key file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_path: Option<PathBuf>,

    /// Pre-minted OAuth access token (`GOOGLE_OAUTH_ACCESS_TOKEN`)
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// OAuth scopes requested for service-account tokens
    pub scopes: Vec<String>,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_path: None,
            access_token: None,
            scopes: vec![
                "https://www.googleapis.com/auth/datastore".to_string(),
                "https://www.googleapis.com/auth/devstorage.read_write".to_string(),
            ],
        }
    }
}

impl GcpConfig {
    /// Whether any credential source is configured
    pub fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.credentials_path.is_some()
    }
}

/// Deal storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DealBackend {
    /// Firestore when a project and credentials are available, otherwise memory
    #[default]
    Auto,
    /// In-process map, lost on restart
    Memory,
    /// JSON documents under `storage.data_dir`
    File,
    /// Google Firestore
    Firestore,
}

/// Deal storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selector
    pub backend: DealBackend,

    /// Base directory for file-backed stores
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: DealBackend::Auto,
            data_dir: default_data_dir(),
        }
    }
}

/// Firestore settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirestoreConfig {
    /// API endpoint (overridden by `FIRESTORE_EMULATOR_HOST`)
    pub endpoint: String,

    /// Database id
    pub database: String,

    /// Collection holding deal documents
    pub collection: String,

    /// Talk to the local emulator (no real credentials needed)
    pub emulator: bool,

    /// Attempts for a precondition-guarded update before reporting a conflict
    pub max_update_attempts: u32,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://firestore.googleapis.com".to_string(),
            database: "(default)".to_string(),
            collection: "deals".to_string(),
            emulator: false,
            max_update_attempts: 5,
        }
    }
}

/// Artefact storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactBackend {
    /// Cloud Storage when a bucket and credentials are available, otherwise memory
    #[default]
    Auto,
    /// In-process map
    Memory,
    /// Files under `storage.data_dir/artefacts`
    File,
    /// Google Cloud Storage
    Gcs,
}

/// Artefact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtefactConfig {
    /// Backend selector
    pub backend: ArtefactBackend,

    /// Bucket name (`DEALROOM_BUCKET` / `GCS_BUCKET`)
    pub bucket: Option<String>,

    /// API endpoint (overridden by `STORAGE_EMULATOR_HOST`)
    pub endpoint: String,

    /// Talk to a local emulator (no real credentials needed)
    pub emulator: bool,
}

impl Default for ArtefactConfig {
    fn default() -> Self {
        Self {
            backend: ArtefactBackend::Auto,
            bucket: None,
            endpoint: "https://storage.googleapis.com".to_string(),
            emulator: false,
        }
    }
}

/// Memo generator provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorProvider {
    /// Deterministic placeholder content
    #[default]
    Heuristic,
    /// Google Gemini via the Generative Language API
    Gemini,
}

/// Memo generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Provider selector
    pub provider: GeneratorProvider,

    /// Model name
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// Custom base URL
    pub base_url: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: GeneratorProvider::Heuristic,
            model: "gemini-2.5-flash".to_string(),
            api_key_ref: "gemini_api_key".to_string(),
            base_url: None,
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    /// Resolve the API key from the environment.
    ///
    /// Tries the exact `api_key_ref` first, then its UPPER_CASE form.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_ref)
            .or_else(|_| std::env::var(self.api_key_ref.to_uppercase()))
            .ok()
    }
}

/// Founder invite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    /// Base URL the token is appended to
    pub base_url: String,

    /// Lifetime used when the caller does not pass one
    pub default_ttl_minutes: i64,

    /// Shortest accepted lifetime
    pub min_ttl_minutes: i64,

    /// Longest accepted lifetime
    pub max_ttl_minutes: i64,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://founder-chat.example.com/invite".to_string(),
            default_ttl_minutes: 60,
            min_ttl_minutes: 5,
            max_ttl_minutes: 1440,
        }
    }
}

impl DealroomConfig {
    /// Load from an optional TOML file, then overlay the process environment
    pub fn load(path: Option<&std::path::Path>) -> crate::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content).map_err(|e| {
                    crate::Error::Config(format!("Invalid config {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay recognised environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup (used by tests)
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = lookup("GCP_PROJECT_ID") {
            self.gcp.project_id = Some(project);
        }
        if let Some(path) = lookup("GOOGLE_APPLICATION_CREDENTIALS") {
            self.gcp.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(token) = lookup("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.gcp.access_token = Some(token);
        }
        if let Some(bucket) = lookup("DEALROOM_BUCKET").or_else(|| lookup("GCS_BUCKET")) {
            self.artefacts.bucket = Some(bucket);
        }
        if let Some(host) = lookup("FIRESTORE_EMULATOR_HOST") {
            self.firestore.endpoint = with_scheme(&host);
            self.firestore.emulator = true;
        }
        if let Some(host) = lookup("STORAGE_EMULATOR_HOST") {
            self.artefacts.endpoint = with_scheme(&host);
            self.artefacts.emulator = true;
        }
        if let Some(url) = lookup("DEALROOM_INVITE_BASE_URL") {
            self.invites.base_url = url;
        }
    }

    /// Resolve `auto` into a concrete deal backend
    pub fn resolved_deal_backend(&self) -> DealBackend {
        match self.storage.backend {
            DealBackend::Auto => {
                let credentials = self.firestore.emulator || self.gcp.has_credentials();
                if self.gcp.project_id.is_some() && credentials {
                    DealBackend::Firestore
                } else {
                    DealBackend::Memory
                }
            }
            other => other,
        }
    }

    /// Resolve `auto` into a concrete artefact backend
    pub fn resolved_artefact_backend(&self) -> ArtefactBackend {
        match self.artefacts.backend {
            ArtefactBackend::Auto => {
                let credentials = self.artefacts.emulator || self.gcp.has_credentials();
                if self.artefacts.bucket.is_some() && credentials {
                    ArtefactBackend::Gcs
                } else {
                    ArtefactBackend::Memory
                }
            }
            other => other,
        }
    }
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", host.trim_end_matches('/'))
    }
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dealroom")
}
