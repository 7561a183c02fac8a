//! Abstract identity API collaborator
//!
//! The orchestrators hold an `Arc<dyn IdentityApi>`; production code wires
//! in [`crate::HttpIdentityApi`], tests script a mock. Every operation
//! either returns a transaction-shaped result or an [`ApiError`] carrying
//! the raw HTTP status for the classifiers.

use async_trait::async_trait;

use ag_types::{
    AuthorizationToken, ChallengeMethod, ContactToken, ContinuationToken, Handle, OAuthPurpose,
    OAuthService,
};
use ag_utils::CredentialVerifier;

use crate::dto::{AuthnResponse, OAuthEndpoint, RedirectParams, ResetResponse, SignUpRequest};
use crate::error::ApiError;

/// Proof supplied to satisfy a password-reset challenge
#[derive(Debug, Clone)]
pub enum ResetProof {
    /// Out-of-band contact verification token (from a reset link)
    Contact(ContactToken),
    /// Code for the selected second-factor method
    Challenge { method: ChallengeMethod, code: String },
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Begin an authentication transaction for a handle
    async fn start_authentication(
        &self,
        handle: &Handle,
        params: &RedirectParams,
    ) -> Result<AuthnResponse, ApiError>;

    /// Submit the primary factor (a live password proof, not the stored
    /// verifier)
    async fn verify_password(
        &self,
        token: &ContinuationToken,
        password: &str,
    ) -> Result<AuthnResponse, ApiError>;

    /// Trigger out-of-band code dispatch for a challenge method
    /// (e.g. send the SMS)
    async fn request_challenge_dispatch(
        &self,
        token: &ContinuationToken,
        method: ChallengeMethod,
    ) -> Result<(), ApiError>;

    /// Submit a second-factor code
    async fn verify_challenge(
        &self,
        token: &ContinuationToken,
        method: ChallengeMethod,
        code: &str,
    ) -> Result<AuthnResponse, ApiError>;

    /// Re-prove the primary factor for the current session before a
    /// sensitive action
    async fn verify_password_step_up(&self, password: &str) -> Result<AuthnResponse, ApiError>;

    /// Register a new account
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthnResponse, ApiError>;

    /// Begin a password-reset transaction for a handle
    async fn start_password_reset_authentication(
        &self,
        handle: &Handle,
    ) -> Result<ResetResponse, ApiError>;

    /// Satisfy one reset challenge; on success the response carries the
    /// authorization token
    async fn authenticate_reset_factor(
        &self,
        token: &ContinuationToken,
        proof: &ResetProof,
    ) -> Result<ResetResponse, ApiError>;

    /// Spend the reset authorization token on a new credential verifier
    async fn submit_password_reset(
        &self,
        authorization_token: &AuthorizationToken,
        verifier: &CredentialVerifier,
    ) -> Result<(), ApiError>;

    /// Ask the server for the provider's authorization endpoint.
    ///
    /// `state` is the locally generated anti-forgery value the provider
    /// must echo back; the response repeats it alongside the endpoint.
    async fn start_oauth(
        &self,
        service: OAuthService,
        purpose: OAuthPurpose,
        state: &str,
        redirect_uri: Option<&str>,
    ) -> Result<OAuthEndpoint, ApiError>;

    /// Resume the transaction with the provider's authorization code.
    ///
    /// Callers must have verified the echoed anti-forgery state first; this
    /// operation trusts its inputs.
    async fn complete_oauth(
        &self,
        purpose: OAuthPurpose,
        code: &str,
        state: &str,
    ) -> Result<AuthnResponse, ApiError>;
}
