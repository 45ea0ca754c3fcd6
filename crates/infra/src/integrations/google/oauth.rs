//! Interactive OAuth login for Google accounts.
//!
//! Runs the PKCE authorization-code flow against a loopback `axum` server,
//! then resolves the account email through the userinfo endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use calmirror_common::auth::{OAuthClient, OAuthClientError, OAuthSettings, PkceChallenge, TokenSet};
use calmirror_domain::{CalMirrorError, Result};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::InfraError;

/// Starts login sessions for one OAuth client registration.
#[derive(Debug, Clone)]
pub struct GoogleLogin {
    oauth: OAuthClient,
    http: Client,
    userinfo_url: String,
}

impl GoogleLogin {
    pub fn new(settings: OAuthSettings, userinfo_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let oauth = OAuthClient::new(settings, timeout).map_err(map_oauth_client_error)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalMirrorError::from(InfraError::from(e)))?;
        Ok(Self { oauth, http, userinfo_url: userinfo_url.into() })
    }

    /// Bind the loopback listener and prepare the authorization URL.
    pub async fn start(&self) -> Result<LoginSession<'_>> {
        let server = OAuthCallbackServer::start().await?;
        let challenge = PkceChallenge::generate();
        server.set_expected_state(challenge.state.clone());

        let redirect_uri = server.redirect_uri();
        let authorization_url = self.oauth.authorization_url(&challenge, &redirect_uri);

        Ok(LoginSession { login: self, server, challenge, redirect_uri, authorization_url })
    }

    /// Email address of the account owning `access_token`.
    pub async fn account_email(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CalMirrorError::from(InfraError::from(e)))?;

        let info: UserInfo =
            response.json().await.map_err(|e| CalMirrorError::from(InfraError::from(e)))?;
        info.email.filter(|email| !email.is_empty()).ok_or_else(|| {
            CalMirrorError::Auth("userinfo response carries no email (missing email scope?)".into())
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Represents an in-flight OAuth login.
pub struct LoginSession<'a> {
    login: &'a GoogleLogin,
    server: OAuthCallbackServer,
    challenge: PkceChallenge,
    redirect_uri: String,
    authorization_url: String,
}

impl LoginSession<'_> {
    /// Authorization URL to open in the user's browser.
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    /// Wait for the callback, exchange the code and resolve the account.
    pub async fn finish(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(String, TokenSet)> {
        let code = self.server.wait_for_code(timeout, cancel).await;
        self.server.shutdown().await?;
        let code = code?;

        let tokens = self
            .login
            .oauth
            .exchange_code(&code, &self.challenge.code_verifier, &self.redirect_uri)
            .await
            .map_err(map_oauth_client_error)?;
        if tokens.refresh_token.is_none() {
            return Err(CalMirrorError::Auth(
                "provider issued no refresh token; revoke the app's access and retry".into(),
            ));
        }

        let email = self.login.account_email(&tokens.access_token).await?;
        info!(email = %email, "oauth.login.completed");
        Ok((email, tokens))
    }
}

/// What the provider sent back to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackOutcome {
    Code(String),
    Denied(String),
}

/// Loopback HTTP server that receives OAuth redirect callbacks.
pub struct OAuthCallbackServer {
    port: u16,
    outcome: Arc<Mutex<Option<CallbackOutcome>>>,
    expected_state: Arc<Mutex<Option<String>>>,
    arrived: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OAuthCallbackServer {
    /// Start the loopback server on an ephemeral port.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| {
            CalMirrorError::Network(format!("failed to bind OAuth loopback server: {err}"))
        })?;

        let port = listener
            .local_addr()
            .map_err(|err| CalMirrorError::Network(format!("failed to determine port: {err}")))?
            .port();

        let outcome = Arc::new(Mutex::new(None));
        let expected_state = Arc::new(Mutex::new(None));
        let arrived = Arc::new(Notify::new());

        let state = CallbackState {
            outcome: Arc::clone(&outcome),
            expected_state: Arc::clone(&expected_state),
            arrived: Arc::clone(&arrived),
        };
        let app = Router::new().route(
            "/callback",
            get(move |query: Query<HashMap<String, String>>| handle_oauth_callback(query, state.clone())),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "oauth.callback_server.failed");
            }
        });

        Ok(Self {
            port,
            outcome,
            expected_state,
            arrived,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Redirect URI used in the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Configure expected OAuth state for CSRF validation.
    pub fn set_expected_state(&self, state: String) {
        *self.expected_state.lock() = Some(state);
    }

    /// Await the OAuth callback with a timeout.
    pub async fn wait_for_code(&self, timeout: Duration, cancel: &CancellationToken) -> Result<String> {
        if self.expected_state.lock().is_none() {
            return Err(CalMirrorError::Config("OAuth expected state not configured".to_string()));
        }

        let wait = async {
            loop {
                let notified = self.arrived.notified();
                if let Some(outcome) = self.outcome.lock().clone() {
                    return outcome;
                }
                notified.await;
            }
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(CalMirrorError::Cancelled),
            result = tokio::time::timeout(timeout, wait) => result.map_err(|_| {
                CalMirrorError::Auth("timed out waiting for the OAuth callback".into())
            })?,
        };

        match outcome {
            CallbackOutcome::Code(code) => Ok(code),
            CallbackOutcome::Denied(reason) => {
                Err(CalMirrorError::Auth(format!("authorization denied: {reason}")))
            }
        }
    }

    /// Shut down the loopback server gracefully.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(CalMirrorError::Internal(format!(
                        "OAuth callback server panicked: {err}"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OAuthCallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

#[derive(Clone)]
struct CallbackState {
    outcome: Arc<Mutex<Option<CallbackOutcome>>>,
    expected_state: Arc<Mutex<Option<String>>>,
    arrived: Arc<Notify>,
}

async fn handle_oauth_callback(
    Query(params): Query<HashMap<String, String>>,
    state: CallbackState,
) -> Html<&'static str> {
    let expected = state.expected_state.lock().clone();
    if expected.is_none() || params.get("state") != expected.as_ref() {
        return Html(FAILURE_PAGE);
    }

    let outcome = match (params.get("code"), params.get("error")) {
        (Some(code), _) if !code.is_empty() => CallbackOutcome::Code(code.clone()),
        (_, Some(reason)) => CallbackOutcome::Denied(reason.clone()),
        _ => return Html(FAILURE_PAGE),
    };

    let page = match outcome {
        CallbackOutcome::Code(_) => SUCCESS_PAGE,
        CallbackOutcome::Denied(_) => FAILURE_PAGE,
    };
    *state.outcome.lock() = Some(outcome);
    state.arrived.notify_waiters();
    Html(page)
}

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window and return to calmirror.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Invalid or unexpected callback parameters.</p></body>
</html>"#;

pub(crate) fn map_oauth_client_error(err: OAuthClientError) -> CalMirrorError {
    match err {
        OAuthClientError::RequestFailed(e) => InfraError::from(e).into(),
        OAuthClientError::OAuthError(e) => CalMirrorError::Auth(e.to_string()),
        OAuthClientError::UnexpectedStatus { status, body } => {
            CalMirrorError::Auth(format!("token endpoint returned {status}: {body}"))
        }
        OAuthClientError::ParseError(msg) => CalMirrorError::InvalidInput(msg),
        OAuthClientError::NoRefreshToken => {
            CalMirrorError::Auth("no refresh token stored for account".into())
        }
    }
}
