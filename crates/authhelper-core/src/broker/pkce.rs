//! PKCE (RFC 7636) material and the CSRF `state` value for one authorization request.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 64;
const STATE_BYTES: usize = 16;

/// Code verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Sent with the token request
    pub verifier: String,
    /// Sent with the authorization request
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::rng().fill_bytes(&mut bytes);

        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = Self::derive_challenge(&verifier);

        Self {
            verifier,
            challenge,
        }
    }

    /// `base64url(sha256(verifier))`
    pub fn derive_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

/// Random hex string echoed back by the authorization server.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
