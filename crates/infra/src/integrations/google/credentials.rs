//! OAuth client registration
//!
//! Resolves the client id and secret from the Google console client-secrets
//! file and/or explicit configuration values.

use std::path::Path;

use calmirror_common::auth::OAuthSettings;
use calmirror_domain::{CalMirrorError, GoogleConfig, Result};
use serde::Deserialize;

/// Client-secrets file as downloaded from the Google console.
///
/// Desktop clients are stored under `installed`, web clients under `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// Build OAuth settings for Google from configuration.
///
/// Explicit `client_id`/`client_secret` values override the file. Endpoints
/// from the file override the configured defaults.
pub fn oauth_settings(config: &GoogleConfig) -> Result<OAuthSettings> {
    let secrets = match &config.credentials_path {
        Some(path) => Some(read_client_secrets(path)?),
        None => None,
    };

    let client_id = config
        .client_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| secrets.as_ref().map(|s| s.client_id.clone()))
        .ok_or_else(|| {
            CalMirrorError::Config(
                "no OAuth client configured (set google.credentials_path or google.client_id)"
                    .to_string(),
            )
        })?;
    let client_secret = config
        .client_secret
        .clone()
        .or_else(|| secrets.as_ref().and_then(|s| s.client_secret.clone()));

    let authorization_endpoint = secrets
        .as_ref()
        .and_then(|s| s.auth_uri.clone())
        .unwrap_or_else(|| config.auth_url.clone());
    let token_endpoint = secrets
        .as_ref()
        .and_then(|s| s.token_uri.clone())
        .unwrap_or_else(|| config.token_url.clone());

    Ok(OAuthSettings {
        client_id,
        client_secret,
        authorization_endpoint,
        token_endpoint,
        scopes: config.scopes.clone(),
        extra_authorize_params: vec![
            ("access_type".to_string(), "offline".to_string()),
            ("prompt".to_string(), "consent".to_string()),
        ],
    })
}

fn read_client_secrets(path: &Path) -> Result<ClientSecrets> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CalMirrorError::Config(format!(
            "failed to read client secrets {}: {e}",
            path.display()
        ))
    })?;
    let file: ClientSecretsFile = serde_json::from_str(&contents).map_err(|e| {
        CalMirrorError::Config(format!("invalid client secrets {}: {e}", path.display()))
    })?;

    file.installed.or(file.web).ok_or_else(|| {
        CalMirrorError::Config(format!(
            "client secrets {} contain neither an `installed` nor a `web` client",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn secrets_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn installed_client_is_read_from_file() {
        let file = secrets_file(
            r#"{"installed":{"client_id":"id-1.apps.googleusercontent.com","client_secret":"s1",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token"}}"#,
        );
        let config = GoogleConfig {
            credentials_path: Some(file.path().to_path_buf()),
            ..GoogleConfig::default()
        };

        let settings = oauth_settings(&config).unwrap();
        assert_eq!(settings.client_id, "id-1.apps.googleusercontent.com");
        assert_eq!(settings.client_secret.as_deref(), Some("s1"));
        assert_eq!(settings.authorization_endpoint, "https://accounts.google.com/o/oauth2/auth");
        assert!(settings.extra_authorize_params.contains(&("prompt".into(), "consent".into())));
    }

    #[test]
    fn explicit_values_override_file() {
        let file = secrets_file(r#"{"web":{"client_id":"from-file","client_secret":"file-secret"}}"#);
        let config = GoogleConfig {
            credentials_path: Some(file.path().to_path_buf()),
            client_id: Some("from-config".into()),
            ..GoogleConfig::default()
        };

        let settings = oauth_settings(&config).unwrap();
        assert_eq!(settings.client_id, "from-config");
        assert_eq!(settings.client_secret.as_deref(), Some("file-secret"));
        assert_eq!(settings.token_endpoint, config.token_url);
    }

    #[test]
    fn missing_client_is_config_error() {
        let err = oauth_settings(&GoogleConfig::default()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn file_without_client_is_rejected() {
        let file = secrets_file(r#"{"other":{}}"#);
        let config = GoogleConfig {
            credentials_path: Some(file.path().to_path_buf()),
            ..GoogleConfig::default()
        };
        assert!(oauth_settings(&config).unwrap_err().to_string().contains("installed"));
    }
}
