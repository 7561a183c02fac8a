//! Random value generation
//!
//! Anti-forgery state strings bind an OAuth redirect response to the
//! handshake that initiated it; salts feed the verifier derivation.

use anyhow::Result;
use rand::{thread_rng, Rng};
use ring::rand::{SecureRandom, SystemRandom};

/// Generate a random anti-forgery state string for an OAuth handshake.
///
/// 32 characters from [A-Z] [a-z] [0-9]. The value is persisted locally
/// before the redirect and must equal the `state` parameter echoed back by
/// the provider before the returned authorization code is trusted.
pub fn generate_anti_forgery_state() -> String {
    let mut rng = thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}

/// Generate a 16-byte random salt
pub fn generate_salt() -> Result<[u8; 16]> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("Failed to generate random bytes"))?;
    Ok(bytes)
}
