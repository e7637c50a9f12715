//! Bearer tokens for the search analytics API.
//!
//! A fixed token from config wins. Otherwise the service-account key file is
//! read when a token is first needed, exchanged for an access token through
//! the JWT bearer grant, and the token is cached until shortly before expiry.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use gscdb_core::AppConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::client::error_body;
use crate::error::ClientError;

/// Read-only search analytics scope.
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3_600;

/// A cached token is replaced this long before it expires.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

#[derive(Debug, Serialize, Deserialize)]
struct GrantClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
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

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

enum Source {
    Fixed(String),
    ServiceAccount {
        path: PathBuf,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Supplies the bearer token for each API request.
pub struct TokenProvider {
    source: Source,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Source::Fixed(_) => f.debug_tuple("TokenProvider::Fixed").field(&"[redacted]").finish(),
            Source::ServiceAccount { path, .. } => f
                .debug_struct("TokenProvider::ServiceAccount")
                .field("path", path)
                .finish(),
        }
    }
}

impl TokenProvider {
    /// Always sends `token`. It is never refreshed.
    #[must_use]
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Fixed(token.into()),
        }
    }

    /// Mints tokens from the service-account key at `path`. The file is not
    /// read until the first token is requested.
    #[must_use]
    pub fn service_account_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::ServiceAccount {
                path: path.into(),
                cached: Mutex::new(None),
            },
        }
    }

    /// `GSCDB_ACCESS_TOKEN` when set, otherwise the key at
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        match &config.access_token {
            Some(token) => Self::fixed(token.clone()),
            None => Self::service_account_file(config.credentials_path.clone()),
        }
    }

    /// Returns a usable token, running the grant when the cache is empty or
    /// about to expire.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Credentials`] if the key file cannot be read or parsed,
    ///   or its private key cannot sign.
    /// - [`ClientError::Auth`] if the token endpoint rejects the grant.
    /// - [`ClientError::Api`] / [`ClientError::Http`] on other token endpoint failures.
    pub(crate) async fn token(&self, http: &Client) -> Result<String, ClientError> {
        let (path, cached) = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::ServiceAccount { path, cached } => (path, cached),
        };

        let mut cached = cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let key = load_service_account_key(path)?;
        let fresh = request_token(http, &key, path, now).await?;
        tracing::debug!(
            client_email = %key.client_email,
            expires_at = %fresh.expires_at,
            "access token refreshed"
        );
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

fn credentials_error(path: &Path, reason: &dyn std::fmt::Display) -> ClientError {
    ClientError::Credentials {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_service_account_key(path: &Path) -> Result<ServiceAccountKey, ClientError> {
    let raw = std::fs::read_to_string(path).map_err(|e| credentials_error(path, &e))?;
    serde_json::from_str(&raw).map_err(|e| credentials_error(path, &e))
}

fn sign_assertion(
    key: &ServiceAccountKey,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<String, ClientError> {
    let claims = GrantClaims {
        iss: key.client_email.clone(),
        scope: READONLY_SCOPE.to_owned(),
        aud: key.token_uri.clone(),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };
    let signing_key =
        EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| credentials_error(path, &e))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| credentials_error(path, &e))
}

async fn request_token(
    http: &Client,
    key: &ServiceAccountKey,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<CachedToken, ClientError> {
    let assertion = sign_assertion(key, path, now)?;
    let response = http
        .post(key.token_uri.as_str())
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if status.is_client_error() {
        let message = error_body(response).await;
        return Err(ClientError::Auth(format!("token grant rejected ({status}): {message}")));
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_body(response).await,
        });
    }

    let body = response.text().await?;
    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
        context: "token grant".to_owned(),
        source: e,
    })?;

    Ok(CachedToken {
        value: parsed.access_token,
        expires_at: now + TimeDelta::seconds(parsed.expires_in.max(0)),
    })
}
