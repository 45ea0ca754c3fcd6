//! Application context - wires configuration to adapters and services

use std::path::{Path, PathBuf};
use std::sync::Arc;

use calmirror_common::resilience::{TokenBucket, TokenBucketConfig};
use calmirror_core::sync::{SyncEngine, SyncService};
use calmirror_domain::{AppConfig, CalMirrorError, Result};
use calmirror_infra::config;
use calmirror_infra::database::SqliteCorrelationStore;
use calmirror_infra::google::{oauth_settings, GoogleConnector, GoogleLogin, TokenStore};
use tracing::debug;

/// Loaded configuration plus the adapters every command needs.
pub struct AppContext {
    pub config: AppConfig,
    pub tokens: Arc<TokenStore>,
}

impl AppContext {
    /// Load configuration from `config_path` or the standard locations.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = config::load(config_path)?;
        let tokens = Arc::new(TokenStore::new(required_path(
            config.google.token_store_path.as_ref(),
            "google.token_store_path",
        )?));
        debug!(token_store = %tokens.path().display(), "context.loaded");
        Ok(Self { config, tokens })
    }

    /// Interactive login helper for `auth add`.
    pub fn login(&self) -> Result<GoogleLogin> {
        let google = &self.config.google;
        GoogleLogin::new(oauth_settings(google)?, &google.userinfo_url, google.request_timeout())
    }

    /// Sync service over the correlation store and stored accounts.
    ///
    /// Opening the store takes the single-process lock, which is held until
    /// the service is dropped.
    pub fn sync_service(&self) -> Result<SyncService> {
        let connector = GoogleConnector::from_config(&self.config.google, Arc::clone(&self.tokens))?;

        let db_path = required_path(self.config.storage.db_path.as_ref(), "storage.db_path")?;
        let store = SqliteCorrelationStore::open(db_path, self.config.storage.pool_size)?;

        let limiter = TokenBucket::new(TokenBucketConfig::every(self.config.sync.rate_limit_interval()))
            .map_err(|e| CalMirrorError::Config(e.to_string()))?;
        let engine = SyncEngine::new(Arc::new(store), Arc::new(limiter))
            .with_page_size(self.config.sync.page_size);

        Ok(SyncService::new(Arc::new(connector), engine))
    }
}

fn required_path(path: Option<&PathBuf>, key: &str) -> Result<PathBuf> {
    path.cloned().ok_or_else(|| CalMirrorError::Config(format!("{key} is not set")))
}
