//! Account connector for Google Calendar.
//!
//! Turns a stored account into a ready calendar backend, refreshing the access
//! token first when it is close to expiry.

use std::sync::Arc;

use async_trait::async_trait;
use calmirror_common::auth::{OAuthClient, TokenSet};
use calmirror_core::sync::{CalendarBackend, CalendarConnector};
use calmirror_domain::constants::TOKEN_REFRESH_THRESHOLD_SECS;
use calmirror_domain::{CalMirrorError, GoogleConfig, Result};
use reqwest::Client;
use tracing::{debug, info};

use super::client::GoogleCalendarClient;
use super::credentials::oauth_settings;
use super::oauth::map_oauth_client_error;
use super::token_store::TokenStore;
use crate::errors::InfraError;

/// Connector backed by the JSON token store.
pub struct GoogleConnector {
    store: Arc<TokenStore>,
    oauth: OAuthClient,
    http: Client,
    api_base_url: String,
}

impl GoogleConnector {
    /// Build a connector for `config`, refreshing tokens through `oauth`.
    pub fn new(config: &GoogleConfig, store: Arc<TokenStore>, oauth: OAuthClient) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CalMirrorError::from(InfraError::from(e)))?;
        Ok(Self { store, oauth, http, api_base_url: config.api_base_url.clone() })
    }

    /// Build a connector whose OAuth client comes from `config`.
    pub fn from_config(config: &GoogleConfig, store: Arc<TokenStore>) -> Result<Self> {
        let oauth = OAuthClient::new(oauth_settings(config)?, config.request_timeout())
            .map_err(map_oauth_client_error)?;
        Self::new(config, store, oauth)
    }

    /// Valid access token for `email`, refreshed and persisted if needed.
    async fn access_token(&self, email: &str) -> Result<String> {
        let tokens = self.store.get(email)?.ok_or_else(|| {
            CalMirrorError::Config(format!(
                "account {email} not authenticated (run `calmirror auth add`)"
            ))
        })?;

        if !tokens.is_expired(TOKEN_REFRESH_THRESHOLD_SECS) {
            return Ok(tokens.access_token);
        }

        let refreshed = self.refresh(email, &tokens).await?;
        let access_token = refreshed.access_token.clone();
        self.store.upsert(email, refreshed)?;
        Ok(access_token)
    }

    async fn refresh(&self, email: &str, tokens: &TokenSet) -> Result<TokenSet> {
        debug!(email, expires_in = tokens.seconds_until_expiry(), "oauth.token.refreshing");
        let refresh_token = tokens.refresh_token.as_deref().unwrap_or_default();

        let mut refreshed = self
            .oauth
            .refresh_access_token(refresh_token)
            .await
            .map_err(map_oauth_client_error)?;
        if refreshed.id_token.is_none() {
            refreshed.id_token.clone_from(&tokens.id_token);
        }

        info!(email, expires_in = refreshed.seconds_until_expiry(), "oauth.token.refreshed");
        Ok(refreshed)
    }
}

#[async_trait]
impl CalendarConnector for GoogleConnector {
    async fn accounts(&self) -> Result<Vec<String>> {
        self.store.emails()
    }

    async fn connect(&self, account_email: &str) -> Result<Arc<dyn CalendarBackend>> {
        let access_token = self.access_token(account_email).await?;
        Ok(Arc::new(GoogleCalendarClient::with_client(
            self.http.clone(),
            self.api_base_url.clone(),
            access_token,
        )))
    }
}
