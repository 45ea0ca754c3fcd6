//! Integration tests for auth module
//!
//! Drives the authorization-code flow against a mock token endpoint.

#![cfg(feature = "platform")]

use std::time::Duration;

use calmirror_common::auth::pkce::code_challenge;
use calmirror_common::auth::{OAuthClient, OAuthClientError, OAuthSettings, PkceChallenge};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> OAuthSettings {
    OAuthSettings {
        client_id: "installed-app".into(),
        client_secret: None,
        authorization_endpoint: format!("{}/auth", server.uri()),
        token_endpoint: format!("{}/token", server.uri()),
        scopes: vec!["https://www.googleapis.com/auth/calendar.events".into()],
        extra_authorize_params: vec![
            ("access_type".into(), "offline".into()),
            ("prompt".into(), "consent".into()),
        ],
    }
}

/// The challenge in the authorization URL must be derived from the verifier
/// later sent to the token endpoint.
#[tokio::test]
async fn challenge_in_url_matches_verifier_sent_on_exchange() {
    let server = MockServer::start().await;
    let client = OAuthClient::new(settings(&server), Duration::from_secs(5)).unwrap();
    let challenge = PkceChallenge::generate();
    let redirect_uri = "http://localhost:8123/callback";

    let url = client.authorization_url(&challenge, redirect_uri);
    assert!(url.contains(&format!("code_challenge={}", code_challenge(&challenge.code_verifier))));
    assert!(url.contains("prompt=consent"));

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(format!("code_verifier={}", challenge.code_verifier)))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.access",
            "refresh_token": "1//refresh",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar.events",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens =
        client.exchange_code("auth-code", &challenge.code_verifier, redirect_uri).await.unwrap();
    assert_eq!(tokens.access_token, "ya29.access");
    assert!(!tokens.is_expired(300));
    assert!(tokens.seconds_until_expiry().unwrap() > 3500);
}

#[tokio::test]
async fn public_client_does_not_send_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::new(settings(&server), Duration::from_secs(5)).unwrap();
    client.refresh_access_token("1//refresh").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("grant_type=refresh_token"));
    assert!(!body.contains("client_secret"));
}

#[tokio::test]
async fn non_oauth_failure_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = OAuthClient::new(settings(&server), Duration::from_secs(5)).unwrap();
    let err = client.refresh_access_token("1//refresh").await.unwrap_err();

    match err {
        OAuthClientError::UnexpectedStatus { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_token_response_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"token\":1}"))
        .mount(&server)
        .await;

    let client = OAuthClient::new(settings(&server), Duration::from_secs(5)).unwrap();
    let err = client.exchange_code("c", "v", "http://localhost/callback").await.unwrap_err();
    assert!(matches!(err, OAuthClientError::ParseError(_)));
}
