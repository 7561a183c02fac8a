//! Credential verifier derivation
//!
//! Pure, local transformation `password -> verifier`. The verifier is a
//! salted one-way commitment that travels in place of the plaintext for
//! registration, password-change and password-reset payloads; the
//! orchestrators forward it without inspecting it. This module is the
//! capability boundary: every code path that needs to send a password-shaped
//! secret to the server goes through [`derive_verifier`], and the plaintext
//! is zeroized as soon as the commitment exists.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use ag_types::{FlowError, FlowResult};

use crate::crypto::generate_salt;

/// Salted one-way commitment to a password.
///
/// Opaque to everything but the server; Debug output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CredentialVerifier {
    /// base64url-encoded random salt
    pub salt: String,
    /// base64url(SHA-256(salt || password))
    pub commitment: String,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialVerifier(redacted)")
    }
}

/// Derive a credential verifier from a plaintext password.
///
/// The plaintext never leaves this function: the working buffer is zeroized
/// before returning and the result carries only salt and commitment.
pub fn derive_verifier(password: &str) -> FlowResult<CredentialVerifier> {
    let salt = generate_salt().map_err(|e| FlowError::Unknown(e.to_string()))?;

    let mut buffer = Vec::with_capacity(salt.len() + password.len());
    buffer.extend_from_slice(&salt);
    buffer.extend_from_slice(password.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    let hash = hasher.finalize();
    buffer.zeroize();

    Ok(CredentialVerifier {
        salt: URL_SAFE_NO_PAD.encode(salt),
        commitment: URL_SAFE_NO_PAD.encode(hash),
    })
}

/// Rough password strength score in 0..=4.
///
/// Counts length tiers and character-class variety. A score below 2 fails
/// the local strength gate used by sign-up and password-reset.
pub fn password_strength_score(password: &str) -> u8 {
    if password.len() < 8 {
        return 0;
    }

    let mut classes: u8 = 0;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        classes += 1;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        classes += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        classes += 1;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        classes += 1;
    }

    let mut score = classes.saturating_sub(1);
    if password.len() >= 12 {
        score += 1;
    }
    if password.len() >= 16 {
        score += 1;
    }
    score.min(4)
}
