//! Wire DTOs for the identity API
//!
//! Responses stay string-typed at the serde layer; the typed accessors
//! parse status and challenge identifiers and turn anything outside the
//! vocabulary into a protocol error at the boundary.

use serde::{Deserialize, Serialize};

use ag_types::{
    AccessToken, AuthorizationToken, ChallengeMethod, ContinuationToken, FlowResult,
    TransactionStatus,
};
use ag_utils::CredentialVerifier;

/// Transaction-shaped response returned by most authentication operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthnResponse {
    /// Opaque continuation token; absent on terminal responses
    #[serde(default)]
    pub state_token: Option<String>,

    pub status: String,

    /// Second-factor methods offered when status is AWAITING_SECOND_FACTOR
    #[serde(default)]
    pub challenges: Vec<String>,

    /// Issued on SUCCESS
    #[serde(default)]
    pub access_token: Option<String>,
}

impl AuthnResponse {
    pub fn status(&self) -> FlowResult<TransactionStatus> {
        TransactionStatus::parse(&self.status)
    }

    pub fn continuation_token(&self) -> Option<ContinuationToken> {
        self.state_token.clone().map(ContinuationToken::new)
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.access_token.clone().map(AccessToken::new)
    }

    /// Parse the offered challenge list, preserving server order
    pub fn challenge_methods(&self) -> FlowResult<Vec<ChallengeMethod>> {
        self.challenges
            .iter()
            .map(|s| ChallengeMethod::parse(s))
            .collect()
    }
}

/// Response shape for the password-reset sub-flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetResponse {
    #[serde(default)]
    pub state_token: Option<String>,

    /// True once a factor has been satisfied and the authorization token
    /// is present
    #[serde(default)]
    pub authenticated: bool,

    #[serde(default)]
    pub challenges: Vec<String>,

    /// Single-use capability to set a new password
    #[serde(default, rename = "reset_password_token")]
    pub authorization_token: Option<String>,
}

impl ResetResponse {
    pub fn continuation_token(&self) -> Option<ContinuationToken> {
        self.state_token.clone().map(ContinuationToken::new)
    }

    pub fn authorization_token(&self) -> Option<AuthorizationToken> {
        self.authorization_token
            .clone()
            .map(AuthorizationToken::new)
    }

    pub fn challenge_methods(&self) -> FlowResult<Vec<ChallengeMethod>> {
        self.challenges
            .iter()
            .map(|s| ChallengeMethod::parse(s))
            .collect()
    }
}

/// Authorization endpoint handed back when an OAuth handshake starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthEndpoint {
    pub endpoint_uri: String,
    /// Anti-forgery state the provider will echo on return
    pub state: String,
}

/// Optional redirect/PKCE parameters forwarded when starting a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_state: Option<String>,
}

/// Registration payload; the handle lands in exactly one contact field
#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_verifier: CredentialVerifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}
