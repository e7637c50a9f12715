use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Location of the service-account key file used to mint access tokens.
    pub credentials_path: PathBuf,
    /// Fixed bearer token that overrides the service account when set.
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Rows requested per page; the API caps this at 25 000.
    pub page_size: u32,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub sync_interval_hours: u64,
    pub sync_days: u32,
    pub initial_sync_days: u32,
    pub retention_days: u32,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    /// Most recent days the API has not finished ingesting.
    pub ingestion_lag_days: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("credentials_path", &self.credentials_path)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("sync_interval_hours", &self.sync_interval_hours)
            .field("sync_days", &self.sync_days)
            .field("initial_sync_days", &self.initial_sync_days)
            .field("retention_days", &self.retention_days)
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("ingestion_lag_days", &self.ingestion_lag_days)
            .finish()
    }
}
