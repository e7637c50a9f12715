use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Hard cap the search analytics API places on `rowLimit`.
pub const MAX_PAGE_SIZE: u32 = 25_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("GSCDB_ENV", "development"));
    let bind_addr = parse_addr("GSCDB_BIND_ADDR", "127.0.0.1:5050")?;
    let log_level = or_default("GSCDB_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("GSCDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("GSCDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("GSCDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let credentials_path = PathBuf::from(or_default(
        "GOOGLE_APPLICATION_CREDENTIALS",
        "./service-account.json",
    ));
    let access_token = lookup("GSCDB_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let api_base_url = or_default("GSCDB_API_BASE_URL", "https://www.googleapis.com/");
    let request_timeout_secs = parse_u64("GSCDB_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("GSCDB_USER_AGENT", "gscdb/0.1 (search-analytics-sync)");

    let page_size = parse_u32("GSCDB_PAGE_SIZE", "25000")?;
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(invalid(
            "GSCDB_PAGE_SIZE",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let max_retries = parse_u32("GSCDB_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("GSCDB_RETRY_BACKOFF_BASE_MS", "1000")?;

    let sync_interval_hours = parse_u64("GSCDB_SYNC_INTERVAL_HOURS", "6")?;
    if sync_interval_hours == 0 {
        return Err(invalid(
            "GSCDB_SYNC_INTERVAL_HOURS",
            "must be at least 1".to_string(),
        ));
    }

    let sync_days = parse_u32("GSCDB_SYNC_DAYS", "7")?;
    let initial_sync_days = parse_u32("GSCDB_INITIAL_SYNC_DAYS", "90")?;
    let retention_days = parse_u32("GSCDB_RETENTION_DAYS", "90")?;

    let batch_size = parse_usize("GSCDB_BATCH_SIZE", "5")?;
    if batch_size == 0 {
        return Err(invalid("GSCDB_BATCH_SIZE", "must be at least 1".to_string()));
    }
    let batch_delay_ms = parse_u64("GSCDB_BATCH_DELAY_MS", "1000")?;
    let ingestion_lag_days = parse_u32("GSCDB_INGESTION_LAG_DAYS", "2")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        credentials_path,
        access_token,
        api_base_url,
        request_timeout_secs,
        user_agent,
        page_size,
        max_retries,
        retry_backoff_base_ms,
        sync_interval_hours,
        sync_days,
        initial_sync_days,
        retention_days,
        batch_size,
        batch_delay_ms,
        ingestion_lag_days,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
