//! PKCE (Proof Key for Code Exchange) for the OAuth 2.0 installed-app flow
//!
//! Implements RFC 7636. Installed apps cannot keep a client secret private,
//! so every authorization request carries a fresh verifier/challenge pair.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// URL-safe random token of 32 bytes (43 characters).
fn random_token() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Code challenge for `verifier`: `BASE64URL(SHA256(ASCII(verifier)))`.
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// PKCE challenge pair plus CSRF state for one authorization request.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Kept secret until token exchange
    pub code_verifier: String,
    /// Sent in the authorization request
    pub code_challenge: String,
    /// Must match between authorization request and callback
    pub state: String,
}

impl PkceChallenge {
    /// Generate a new challenge with fresh random values.
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = random_token();
        let code_challenge = code_challenge(&code_verifier);
        Self { code_verifier, code_challenge, state: random_token() }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}
