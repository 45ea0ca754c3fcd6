//! Configuration structures
//!
//! Plain serde structs; loading and environment overrides live in the infra
//! crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_FILE, DEFAULT_LOGIN_TIMEOUT_SECS, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE,
    DEFAULT_RATE_LIMIT_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_FILE,
    GOOGLE_AUTH_URL, GOOGLE_CALENDAR_API_BASE, GOOGLE_SCOPES, GOOGLE_TOKEN_URL,
    GOOGLE_USERINFO_URL, MIN_RATE_LIMIT_INTERVAL_MS,
};
use crate::errors::{CalMirrorError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub google: GoogleConfig,
    pub sync: SyncConfig,
}

/// Correlation store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Resolved against the data directory when unset.
    pub db_path: Option<PathBuf>,
    pub pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: None, pool_size: DEFAULT_POOL_SIZE }
    }
}

/// Google OAuth client and API endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Client secrets JSON as downloaded from the Google console.
    pub credentials_path: Option<PathBuf>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Token store file. Resolved against the data directory when unset.
    pub token_store_path: Option<PathBuf>,
    pub api_base_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    pub request_timeout_secs: u64,
    pub login_timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            client_id: None,
            client_secret: None,
            token_store_path: None,
            api_base_url: GOOGLE_CALENDAR_API_BASE.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            scopes: GOOGLE_SCOPES.iter().map(ToString::to_string).collect(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
        }
    }
}

impl GoogleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}

/// Sync engine tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub rate_limit_interval_ms: u64,
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { rate_limit_interval_ms: DEFAULT_RATE_LIMIT_INTERVAL_MS, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl SyncConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }
}

impl AppConfig {
    /// Fill unset file locations with defaults under `data_dir`.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: &Path) -> Self {
        if self.storage.db_path.is_none() {
            self.storage.db_path = Some(data_dir.join(DEFAULT_DB_FILE));
        }
        if self.google.token_store_path.is_none() {
            self.google.token_store_path = Some(data_dir.join(DEFAULT_TOKEN_FILE));
        }
        self
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.storage.pool_size == 0 {
            return Err(CalMirrorError::Config("storage.pool_size must be at least 1".into()));
        }
        if self.sync.rate_limit_interval_ms < MIN_RATE_LIMIT_INTERVAL_MS {
            return Err(CalMirrorError::Config(format!(
                "sync.rate_limit_interval_ms must be at least {MIN_RATE_LIMIT_INTERVAL_MS}"
            )));
        }
        if self.sync.page_size == 0 {
            return Err(CalMirrorError::Config("sync.page_size must be at least 1".into()));
        }
        if self.google.scopes.is_empty() {
            return Err(CalMirrorError::Config("google.scopes must not be empty".into()));
        }
        Ok(())
    }
}
