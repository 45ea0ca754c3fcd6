//! OAuth 2.0 authorization-code flow with PKCE
//!
//! - [`pkce`]: verifier/challenge/state generation (RFC 7636)
//! - [`client`]: authorization URL, code exchange and refresh against a
//!   token endpoint
//! - [`types`]: token sets and client settings
//!
//! Token persistence and the loopback callback listener belong to the
//! infrastructure layer.

pub mod client;
pub mod pkce;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use pkce::PkceChallenge;
pub use types::{OAuthError, OAuthSettings, TokenResponse, TokenSet};
