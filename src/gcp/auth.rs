//! OAuth access tokens for Google APIs
//!
//! Three sources are supported, picked once at startup:
//! - a pre-minted bearer token (`GOOGLE_OAUTH_ACCESS_TOKEN`)
//! - the emulator placeholder token (`owner`)
//! - a service-account key file: an RS256-signed JWT is exchanged at the
//!   key's `token_uri` and the resulting token is cached until shortly before
//!   it expires.

use crate::config::GcpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of bearer tokens for Google API calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token
    async fn token(&self) -> Result<String>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// Fixed token, for pre-minted credentials and emulators
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Token accepted by the Firestore and Storage emulators
    pub fn emulator() -> Self {
        Self::new("owner")
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Raw service-account key file contents
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

/// Service-account JWT bearer flow with token caching
pub struct ServiceAccountTokenSource {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    scopes: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
    client: reqwest::Client,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountTokenSource {
    /// Build from a parsed key
    pub fn new(key: ServiceAccountKey, scopes: &[String]) -> Result<Self> {
        let der = pem_to_der(&key.private_key)?;
        let key_pair = RsaKeyPair::from_pkcs8(&der)
            .map_err(|e| Error::Auth(format!("Invalid service account private key: {}", e)))?;

        Ok(Self {
            client_email: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            token_uri: key.token_uri.clone(),
            scopes: scopes.join(" "),
            key_pair,
            rng: SystemRandom::new(),
            client: reqwest::Client::new(),
            cached: Arc::new(RwLock::new(None)),
        })
    }

    /// Load a key file from disk
    pub fn from_file(path: &Path, scopes: &[String]) -> Result<Self> {
        let content = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            Error::Auth(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?);
        let key: ServiceAccountKey = serde_json::from_str(&content)
            .map_err(|e| Error::Auth(format!("Malformed service account key: {}", e)))?;
        Self::new(key, scopes)
    }

    /// Build the signed JWT assertion for `now`
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
        if let Some(kid) = &self.key_id {
            header["kid"] = serde_json::Value::String(kid.clone());
        }
        let issued_at = now.timestamp();
        let claims = serde_json::json!({
            "iss": self.client_email,
            "scope": self.scopes,
            "aud": self.token_uri,
            "iat": issued_at,
            "exp": issued_at + ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| Error::Auth("Failed to sign JWT assertion".to_string()))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Failed to parse token response: {}", e)))?;

        tracing::debug!(
            client_email = %self.client_email,
            expires_in = parsed.expires_in,
            "Obtained service account access token"
        );

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: now + Duration::seconds(parsed.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<String> {
        let fresh_until = Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS);

        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at > fresh_until {
                return Ok(cached.access_token.clone());
            }
        }

        let mut slot = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > fresh_until {
                return Ok(cached.access_token.clone());
            }
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    fn name(&self) -> &str {
        "service_account"
    }
}

/// Decode a PEM `PRIVATE KEY` block into DER bytes
fn pem_to_der(pem: &str) -> Result<Zeroizing<Vec<u8>>> {
    let body: Zeroizing<String> = Zeroizing::new(
        pem.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("-----"))
            .collect(),
    );
    if body.is_empty() {
        return Err(Error::Auth("Service account private key is empty".to_string()));
    }
    STANDARD
        .decode(body.as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| Error::Auth(format!("Service account private key is not valid PEM: {}", e)))
}

/// Pick the token source for the configured credentials.
///
/// Precedence: explicit access token, service-account key file, emulator.
pub fn token_source_from_config(gcp: &GcpConfig, emulator: bool) -> Result<Arc<dyn TokenSource>> {
    if let Some(token) = &gcp.access_token {
        return Ok(Arc::new(StaticTokenSource::new(token.clone())));
    }
    if let Some(path) = &gcp.credentials_path {
        return Ok(Arc::new(ServiceAccountTokenSource::from_file(
            path,
            &gcp.scopes,
        )?));
    }
    if emulator {
        return Ok(Arc::new(StaticTokenSource::emulator()));
    }
    Err(Error::Config(
        "No Google credentials configured (set GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN)"
            .to_string(),
    ))
}
