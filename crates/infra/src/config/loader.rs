//! Configuration loader
//!
//! Builds [`AppConfig`] from a file, environment overrides and defaults.
//!
//! ## Loading Strategy
//! 1. Start from the explicit `--config` file if given, otherwise the first
//!    file found by [`probe_config_paths`], otherwise built-in defaults
//! 2. Layer `CALMIRROR_*` environment variables on top
//! 3. Validate
//! 4. Resolve unset file locations under the data directory
//!
//! ## Environment Variables
//! - `CALMIRROR_DB_PATH`: Correlation store file
//! - `CALMIRROR_DB_POOL_SIZE`: Connection pool size
//! - `CALMIRROR_TOKEN_STORE`: Token store file
//! - `CALMIRROR_GOOGLE_CREDENTIALS`: Client-secrets JSON file
//! - `CALMIRROR_GOOGLE_CLIENT_ID`: OAuth client id
//! - `CALMIRROR_GOOGLE_CLIENT_SECRET`: OAuth client secret
//! - `CALMIRROR_RATE_LIMIT_MS`: Minimum spacing of destination calls
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./calmirror.toml`
//! 2. `./calmirror.json`
//! 3. `<config_dir>/calmirror/config.toml`

use std::path::{Path, PathBuf};

use calmirror_domain::constants::APP_DIR_NAME;
use calmirror_domain::{AppConfig, CalMirrorError, Result};

/// Load, layer and validate the configuration.
///
/// # Errors
/// Returns `CalMirrorError::Config` if the explicit file is missing, a file
/// or variable cannot be parsed, or the result fails validation.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let base = match path {
        Some(path) => load_from_file(path)?,
        None => match probe_config_paths() {
            Some(found) => load_from_file(&found)?,
            None => {
                tracing::debug!("no config file found, using defaults");
                AppConfig::default()
            }
        },
    };

    let mut config = apply_env_overrides(base)?;
    config.validate()?;
    if config.storage.db_path.is_none() || config.google.token_store_path.is_none() {
        config = config.with_data_dir(&default_data_dir()?);
    }
    Ok(config)
}

/// Load configuration from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CalMirrorError::Config` if the file is missing or malformed.
pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(CalMirrorError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "config.loading");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| CalMirrorError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalMirrorError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalMirrorError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CalMirrorError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Layer `CALMIRROR_*` variables over `config`.
///
/// # Errors
/// Returns `CalMirrorError::Config` if a numeric variable does not parse.
pub fn apply_env_overrides(mut config: AppConfig) -> Result<AppConfig> {
    if let Some(path) = env_path("CALMIRROR_DB_PATH") {
        config.storage.db_path = Some(path);
    }
    if let Some(size) = env_parse::<u32>("CALMIRROR_DB_POOL_SIZE")? {
        config.storage.pool_size = size;
    }
    if let Some(path) = env_path("CALMIRROR_TOKEN_STORE") {
        config.google.token_store_path = Some(path);
    }
    if let Some(path) = env_path("CALMIRROR_GOOGLE_CREDENTIALS") {
        config.google.credentials_path = Some(path);
    }
    if let Some(id) = env_string("CALMIRROR_GOOGLE_CLIENT_ID") {
        config.google.client_id = Some(id);
    }
    if let Some(secret) = env_string("CALMIRROR_GOOGLE_CLIENT_SECRET") {
        config.google.client_secret = Some(secret);
    }
    if let Some(interval) = env_parse::<u64>("CALMIRROR_RATE_LIMIT_MS")? {
        config.sync.rate_limit_interval_ms = interval;
    }
    Ok(config)
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("calmirror.toml"));
        candidates.push(cwd.join("calmirror.json"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR_NAME).join("config.toml"));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Per-user data directory holding the store and tokens.
///
/// # Errors
/// Returns `CalMirrorError::Config` when the platform has no data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)).ok_or_else(|| {
        CalMirrorError::Config(
            "cannot determine a data directory; set CALMIRROR_DB_PATH and CALMIRROR_TOKEN_STORE"
                .to_string(),
        )
    })
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| CalMirrorError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
