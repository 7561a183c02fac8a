//! HTTP implementation of the identity API
//!
//! Thin JSON-over-HTTP client. It performs no classification beyond the
//! transport/status/decode split: a non-2xx answer becomes
//! `ApiError::Http` with the status and the server's `error` message (or
//! raw body) preserved verbatim for the flow-level classifiers.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use ag_types::{
    AccessToken, AuthorizationToken, ChallengeMethod, ContinuationToken, Handle, HandleKind,
    OAuthPurpose, OAuthService,
};
use ag_utils::CredentialVerifier;

use crate::api::{IdentityApi, ResetProof};
use crate::dto::{AuthnResponse, OAuthEndpoint, RedirectParams, ResetResponse, SignUpRequest};
use crate::error::ApiError;

/// JSON error envelope the server uses for non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpIdentityApi {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    /// Bearer token for operations on an established session (step-up)
    session_token: RwLock<Option<AccessToken>>,
}

impl HttpIdentityApi {
    /// Create a client for the identity server at `base_url`
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            session_token: RwLock::new(None),
        }
    }

    /// Attach (or clear) the session token used for step-up calls
    pub fn set_session_token(&self, token: Option<AccessToken>) {
        *self.session_token.write() = token;
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}?client_id={}",
            self.base_url,
            path,
            urlencoding::encode(&self.client_id)
        )
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self.execute(path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// POST where only the status matters (dispatch-style endpoints)
    async fn post_no_content<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync,
    {
        self.execute(path, body).await.map(|_| ())
    }

    async fn execute<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, ApiError>
    where
        B: Serialize + Sync,
    {
        debug!("POST {}", path);
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = self.session_token.read().as_ref() {
            request = request.bearer_auth(token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn start_authentication(
        &self,
        handle: &Handle,
        params: &RedirectParams,
    ) -> Result<AuthnResponse, ApiError> {
        self.post(
            "/api/v1/authn/password/start",
            &json!({
                "handle": handle.as_str(),
                "redirect_uri": params.redirect_uri,
                "code_challenge": params.code_challenge,
                "code_challenge_method": params.code_challenge_method,
                "client_state": params.client_state,
            }),
        )
        .await
    }

    async fn verify_password(
        &self,
        token: &ContinuationToken,
        password: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.post(
            "/api/v1/authn/password/verify",
            &json!({
                "state_token": token.as_str(),
                "password": password,
            }),
        )
        .await
    }

    async fn request_challenge_dispatch(
        &self,
        token: &ContinuationToken,
        method: ChallengeMethod,
    ) -> Result<(), ApiError> {
        self.post_no_content(
            "/api/v1/authn/second_factor/start",
            &json!({
                "state_token": token.as_str(),
                "method": method.as_str(),
            }),
        )
        .await
    }

    async fn verify_challenge(
        &self,
        token: &ContinuationToken,
        method: ChallengeMethod,
        code: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.post(
            "/api/v1/authn/second_factor/verify",
            &json!({
                "state_token": token.as_str(),
                "method": method.as_str(),
                "code": code,
            }),
        )
        .await
    }

    async fn verify_password_step_up(&self, password: &str) -> Result<AuthnResponse, ApiError> {
        self.post(
            "/api/v1/authn/step_up/password",
            &json!({ "password": password }),
        )
        .await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthnResponse, ApiError> {
        self.post("/api/v1/users", request).await
    }

    async fn start_password_reset_authentication(
        &self,
        handle: &Handle,
    ) -> Result<ResetResponse, ApiError> {
        self.post(
            "/api/v1/authn/reset_password/start",
            &json!({ "handle": handle.as_str() }),
        )
        .await
    }

    async fn authenticate_reset_factor(
        &self,
        token: &ContinuationToken,
        proof: &ResetProof,
    ) -> Result<ResetResponse, ApiError> {
        let body = match proof {
            ResetProof::Contact(contact_token) => json!({
                "state_token": token.as_str(),
                "contact_token": contact_token.as_str(),
            }),
            ResetProof::Challenge { method, code } => json!({
                "state_token": token.as_str(),
                "method": method.as_str(),
                "code": code,
            }),
        };
        self.post("/api/v1/authn/reset_password/verify", &body).await
    }

    async fn submit_password_reset(
        &self,
        authorization_token: &AuthorizationToken,
        verifier: &CredentialVerifier,
    ) -> Result<(), ApiError> {
        self.post_no_content(
            "/api/v1/authn/reset_password",
            &json!({
                "authorization_token": authorization_token.as_str(),
                "password_verifier": verifier,
            }),
        )
        .await
    }

    async fn start_oauth(
        &self,
        service: OAuthService,
        purpose: OAuthPurpose,
        state: &str,
        redirect_uri: Option<&str>,
    ) -> Result<OAuthEndpoint, ApiError> {
        self.post(
            "/api/v1/authn/oauth/start",
            &json!({
                "service": service.as_str(),
                "purpose": purpose.as_str(),
                "state": state,
                "redirect_uri": redirect_uri,
            }),
        )
        .await
    }

    async fn complete_oauth(
        &self,
        purpose: OAuthPurpose,
        code: &str,
        state: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.post(
            "/api/v1/authn/oauth/verify",
            &json!({
                "purpose": purpose.as_str(),
                "code": code,
                "state": state,
            }),
        )
        .await
    }
}

// Registration submits the handle as the contact field matching its kind.
pub fn sign_up_request(
    handle: &Handle,
    verifier: CredentialVerifier,
    redirect_uri: Option<String>,
) -> SignUpRequest {
    let mut request = SignUpRequest {
        email: None,
        phone: None,
        username: None,
        password_verifier: verifier,
        redirect_uri,
    };
    match handle.kind() {
        HandleKind::Email => request.email = Some(handle.as_str().to_string()),
        HandleKind::Phone => request.phone = Some(handle.as_str().to_string()),
        HandleKind::Username => request.username = Some(handle.as_str().to_string()),
    }
    request
}
