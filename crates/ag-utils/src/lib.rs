//! Crypto utilities for AuthGate
//!
//! Anti-forgery state generation for OAuth handshakes and local derivation
//! of credential verifiers so plaintext passwords never cross the wire.

pub mod crypto;
pub mod verifier;

pub use crypto::generate_anti_forgery_state;
pub use verifier::{derive_verifier, password_strength_score, CredentialVerifier};
