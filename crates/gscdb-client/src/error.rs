use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the search analytics client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credential problem: a rejected token grant or a 401 from the API.
    /// Fatal when raised during discovery.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The credential cannot read this source (HTTP 403). `fetch_rows` turns
    /// this into an empty result.
    #[error("no access to {site_url}")]
    AccessDenied { site_url: String },

    /// Any other non-2xx response from the API.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pagination limit reached for {site_url}: exceeded {max_pages} pages")]
    PaginationLimit { site_url: String, max_pages: usize },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// The service-account key file is unreadable, malformed, or cannot sign.
    #[error("cannot use credentials at {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },
}

impl ClientError {
    /// `true` for failures caused by the credential rather than the request.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_) | ClientError::Credentials { .. })
    }
}
