//! OAuth linking vocabulary

use serde::{Deserialize, Serialize};

/// Third-party identity provider reachable through the OAuth handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthService {
    Google,
    Facebook,
    Apple,
    Twitter,
    Matters,
}

impl OAuthService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
            Self::Twitter => "twitter",
            Self::Matters => "matters",
        }
    }
}

impl std::fmt::Display for OAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the handshake was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthPurpose {
    /// Sign in with an existing linked account
    Authenticate,
    /// Register a new account through the provider
    Create,
    /// Link the provider to the already-authenticated account
    Bind,
}

impl OAuthPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Create => "create",
            Self::Bind => "bind",
        }
    }
}
