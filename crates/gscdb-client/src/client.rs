//! HTTP client for the search analytics API.
//!
//! Wraps `reqwest` with bearer tokens from a [`TokenProvider`], status
//! classification (401 → [`ClientError::Auth`], 403 →
//! [`ClientError::AccessDenied`]) and transparent pagination of query results.

use std::time::Duration;

use chrono::NaiveDate;
use gscdb_core::AppConfig;
use reqwest::{Client, Response, StatusCode, Url};

use crate::auth::TokenProvider;
use crate::error::ClientError;
use crate::retry::retry_with_backoff;
use crate::types::{
    ApiRow, Dimension, QueryRequest, QueryResponse, SearchRow, SiteEntry, SiteListResponse,
};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/";

/// Hard upper bound on pages fetched for one query.
const MAX_PAGES: usize = 1_000;

/// Error bodies are truncated to this many characters in [`ClientError::Api`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Transport and paging settings for [`SearchConsoleClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub page_size: u32,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 30,
            user_agent: "gscdb/0.1 (search-analytics-sync)".to_owned(),
            page_size: 25_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            page_size: config.page_size,
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
        }
    }
}

/// Client for source discovery and search analytics queries.
pub struct SearchConsoleClient {
    client: Client,
    tokens: TokenProvider,
    base_url: Url,
    page_size: u32,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl SearchConsoleClient {
    /// Creates a client that always sends `access_token`.
    ///
    /// # Errors
    ///
    /// See [`SearchConsoleClient::with_tokens`].
    pub fn new(access_token: &str, settings: &ClientSettings) -> Result<Self, ClientError> {
        Self::with_tokens(TokenProvider::fixed(access_token), settings)
    }

    /// Creates a client that asks `tokens` for a bearer token on each request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `settings.base_url` does not parse.
    pub fn with_tokens(tokens: TokenProvider, settings: &ClientSettings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        // Exactly one trailing slash so path segments append below the root.
        let normalised = format!("{}/", settings.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {e}", settings.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(settings.base_url.clone()));
        }

        Ok(Self {
            client,
            tokens,
            base_url,
            page_size: settings.page_size.max(1),
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
        })
    }

    /// Builds a client from application config. Credentials are not touched
    /// until the first request, so a bad key surfaces from that request.
    ///
    /// # Errors
    ///
    /// See [`SearchConsoleClient::with_tokens`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ClientError> {
        Self::with_tokens(
            TokenProvider::from_app_config(config),
            &ClientSettings::from_app_config(config),
        )
    }

    /// Lists every source the credential can access.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Credentials`] or [`ClientError::Auth`] if no token can
    ///   be obtained, or [`ClientError::Auth`] on a 401 or 403 response.
    /// - [`ClientError::Api`] on any other non-2xx response (after retries).
    /// - [`ClientError::Http`] on network failure.
    /// - [`ClientError::Deserialize`] if the body does not match the expected shape.
    pub async fn discover_sources(&self) -> Result<Vec<SiteEntry>, ClientError> {
        let url = self.build_url(&[]);
        let body: SiteListResponse = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.list_sites(&url)
        })
        .await?;

        tracing::debug!(sources = body.site_entry.len(), "discovered sources");
        Ok(body.site_entry)
    }

    /// Fetches every row for `site_url` over the inclusive `[start, end]`
    /// range, following pages until a short or empty page.
    ///
    /// A 403 for the source is logged and yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Credentials`] or [`ClientError::Auth`] if no token can
    ///   be obtained, or [`ClientError::Auth`] on a 401 response.
    /// - [`ClientError::Api`] / [`ClientError::Http`] on other failures (after retries).
    /// - [`ClientError::PaginationLimit`] if more than `MAX_PAGES` full pages arrive.
    pub async fn fetch_rows(
        &self,
        site_url: &str,
        start: NaiveDate,
        end: NaiveDate,
        dimensions: &[Dimension],
    ) -> Result<Vec<SearchRow>, ClientError> {
        let url = self.build_url(&[site_url, "searchAnalytics", "query"]);
        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let mut rows: Vec<SearchRow> = Vec::new();
        let mut start_row: u64 = 0;

        for page in 0..MAX_PAGES {
            let request = QueryRequest {
                start_date: start.format("%Y-%m-%d").to_string(),
                end_date: end.format("%Y-%m-%d").to_string(),
                dimensions,
                row_limit: self.page_size,
                start_row,
            };

            let result = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                self.query_page(&url, site_url, &request)
            })
            .await;

            let batch = match result {
                Ok(batch) => batch,
                Err(ClientError::AccessDenied { .. }) => {
                    tracing::warn!(site_url, %start, %end, "no access to source, skipping");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };

            let returned = batch.len();
            tracing::debug!(site_url, page, start_row, returned, "fetched page");
            rows.extend(batch.into_iter().map(|r| r.into_search_row(dimensions)));

            if returned < page_size {
                return Ok(rows);
            }
            start_row += returned as u64;
        }

        Err(ClientError::PaginationLimit {
            site_url: site_url.to_owned(),
            max_pages: MAX_PAGES,
        })
    }

    /// Appends `webmasters/v3/sites` plus `extra` segments to the base URL.
    /// Each segment is percent-encoded, so a `site_url` stays one segment.
    fn build_url(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["webmasters", "v3", "sites"])
                .extend(extra);
        }
        url
    }

    async fn list_sites(&self, url: &Url) -> Result<SiteListResponse, ClientError> {
        let token = self.tokens.token(&self.client).await?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let message = error_body(response).await;
                return Err(ClientError::Auth(message));
            }
            status if !status.is_success() => {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: error_body(response).await,
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
            context: "sites.list".to_owned(),
            source: e,
        })
    }

    async fn query_page(
        &self,
        url: &Url,
        site_url: &str,
        request: &QueryRequest<'_>,
    ) -> Result<Vec<ApiRow>, ClientError> {
        let token = self.tokens.token(&self.client).await?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&token)
            .json(request)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                let message = error_body(response).await;
                return Err(ClientError::Auth(message));
            }
            StatusCode::FORBIDDEN => {
                return Err(ClientError::AccessDenied {
                    site_url: site_url.to_owned(),
                });
            }
            status if !status.is_success() => {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: error_body(response).await,
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
                context: format!(
                    "searchAnalytics.query({site_url}, startRow={})",
                    request.start_row
                ),
                source: e,
            })?;

        Ok(parsed.rows)
    }
}

pub(crate) async fn error_body(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) if !text.is_empty() => text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        _ => status.to_string(),
    }
}
