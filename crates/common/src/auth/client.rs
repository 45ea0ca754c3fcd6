//! OAuth 2.0 client implementation with PKCE support
//!
//! Handles the pieces of the authorization-code flow that talk to the
//! provider:
//! - Authorization URL building
//! - Authorization code exchange
//! - Token refresh

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::pkce::PkceChallenge;
use super::types::{OAuthError, OAuthSettings, TokenResponse, TokenSet};

/// Error type for OAuth client operations
#[derive(Debug, Error)]
pub enum OAuthClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// OAuth server returned an error
    #[error("OAuth error: {0}")]
    OAuthError(OAuthError),

    /// Token endpoint answered with a non-OAuth failure
    #[error("token endpoint returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No refresh token available
    #[error("No refresh token available")]
    NoRefreshToken,
}

/// OAuth 2.0 client with PKCE support
#[derive(Debug, Clone)]
pub struct OAuthClient {
    settings: OAuthSettings,
    client: Client,
}

impl OAuthClient {
    /// Create a new OAuth client with the given settings
    pub fn new(settings: OAuthSettings, timeout: Duration) -> Result<Self, OAuthClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Build the browser authorization URL for `challenge`.
    ///
    /// The caller keeps `challenge` to validate the callback state and to
    /// exchange the code.
    #[must_use]
    pub fn authorization_url(&self, challenge: &PkceChallenge, redirect_uri: &str) -> String {
        let mut params = vec![
            ("response_type".to_string(), "code".to_string()),
            ("client_id".to_string(), self.settings.client_id.clone()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("scope".to_string(), self.settings.scope_string()),
            ("state".to_string(), challenge.state.clone()),
            ("code_challenge".to_string(), challenge.code_challenge.clone()),
            ("code_challenge_method".to_string(), challenge.challenge_method().to_string()),
        ];
        params.extend(self.settings.extra_authorize_params.iter().cloned());

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.settings.authorization_endpoint, query_string)
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.settings.client_id.clone()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code_verifier", code_verifier.to_string()),
        ];
        if let Some(secret) = &self.settings.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        debug!(endpoint = %self.settings.token_endpoint, "oauth.exchange_code");
        self.token_request(&form).await
    }

    /// Refresh access token using refresh token
    ///
    /// Providers usually omit the refresh token from refresh responses; the
    /// returned set then keeps `refresh_token`.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.settings.client_id.clone()),
            ("refresh_token", refresh_token.to_string()),
        ];
        if let Some(secret) = &self.settings.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        debug!(endpoint = %self.settings.token_endpoint, "oauth.refresh_token");
        let mut tokens = self.token_request(&form).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn token_request(
        &self,
        form: &[(&str, String)],
    ) -> Result<TokenSet, OAuthClientError> {
        let response = self.client.post(&self.settings.token_endpoint).form(form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OAuthError>(&body) {
                Ok(error) => OAuthClientError::OAuthError(error),
                Err(_) => OAuthClientError::UnexpectedStatus { status: status.as_u16(), body },
            });
        }

        let token_response: TokenResponse =
            serde_json::from_str(&body).map_err(|e| OAuthClientError::ParseError(e.to_string()))?;
        Ok(token_response.into())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings(token_endpoint: String) -> OAuthSettings {
        OAuthSettings {
            client_id: "client-123".into(),
            client_secret: Some("shh".into()),
            authorization_endpoint: "https://accounts.example.com/auth".into(),
            token_endpoint,
            scopes: vec!["scope.a".into(), "scope.b".into()],
            extra_authorize_params: vec![("access_type".into(), "offline".into())],
        }
    }

    fn client(token_endpoint: String) -> OAuthClient {
        OAuthClient::new(settings(token_endpoint), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn authorization_url_carries_pkce_and_extra_params() {
        let client = client("https://accounts.example.com/token".into());
        let challenge = PkceChallenge::generate();
        let url = client.authorization_url(&challenge, "http://localhost:5000/callback");

        assert!(url.starts_with("https://accounts.example.com/auth?response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("scope=scope.a%20scope.b"));
        assert!(url.contains(&format!("state={}", challenge.state)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fcallback"));
        assert!(url.ends_with("access_type=offline"));
    }

    #[tokio::test]
    async fn exchange_code_posts_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier-1"))
            .and(body_string_contains("client_secret=shh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(format!("{}/token", server.uri()))
            .exchange_code("code-1", "verifier-1", "http://localhost/callback")
            .await
            .unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn refresh_keeps_existing_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let tokens =
            client(format!("{}/token", server.uri())).refresh_access_token("refresh-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn oauth_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let err = client(format!("{}/token", server.uri()))
            .refresh_access_token("revoked")
            .await
            .unwrap_err();

        match err {
            OAuthClientError::OAuthError(body) => assert_eq!(body.error, "invalid_grant"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_refresh_token_is_rejected_locally() {
        let err = client("http://127.0.0.1:9/token".into()).refresh_access_token("").await;
        assert!(matches!(err, Err(OAuthClientError::NoRefreshToken)));
    }
}
