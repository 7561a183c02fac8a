//! Scripted identity API mock shared by the orchestrator tests
//!
//! Each operation pops its next scripted result from a queue and counts
//! the call; an unscripted call panics, which is what the
//! "zero network calls" properties rely on. `start`/`verify_password` can
//! be gated on a oneshot so tests can interleave a cancel or a second
//! start with an in-flight response.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use ag_client::{
    ApiError, AuthnResponse, IdentityApi, OAuthEndpoint, RedirectParams, ResetProof,
    ResetResponse, SignUpRequest,
};
use ag_types::{
    AuthorizationToken, ChallengeMethod, ContinuationToken, Handle, OAuthPurpose, OAuthService,
};
use ag_utils::CredentialVerifier;

#[derive(Default)]
pub(crate) struct CallCounts {
    pub start: AtomicUsize,
    pub verify_password: AtomicUsize,
    pub dispatch: AtomicUsize,
    pub verify_challenge: AtomicUsize,
    pub step_up: AtomicUsize,
    pub sign_up: AtomicUsize,
    pub reset_start: AtomicUsize,
    pub reset_factor: AtomicUsize,
    pub reset_submit: AtomicUsize,
    pub oauth_start: AtomicUsize,
    pub oauth_complete: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.start,
            &self.verify_password,
            &self.dispatch,
            &self.verify_challenge,
            &self.step_up,
            &self.sign_up,
            &self.reset_start,
            &self.reset_factor,
            &self.reset_submit,
            &self.oauth_start,
            &self.oauth_complete,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

#[derive(Default)]
pub(crate) struct MockIdentityApi {
    pub start_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,
    pub verify_password_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,
    pub dispatch_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    pub verify_challenge_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,
    pub step_up_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,
    pub sign_up_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,
    pub reset_start_responses: Mutex<VecDeque<Result<ResetResponse, ApiError>>>,
    pub reset_factor_responses: Mutex<VecDeque<Result<ResetResponse, ApiError>>>,
    pub reset_submit_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    pub oauth_start_responses: Mutex<VecDeque<Result<OAuthEndpoint, ApiError>>>,
    pub oauth_complete_responses: Mutex<VecDeque<Result<AuthnResponse, ApiError>>>,

    /// A queued receiver makes the next gated call block until released
    pub start_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub verify_password_gate: Mutex<Option<oneshot::Receiver<()>>>,

    pub calls: CallCounts,
}

impl MockIdentityApi {
    pub fn new() -> Self {
        Self::default()
    }
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, ApiError>>>, op: &str) -> Result<T, ApiError> {
    queue
        .lock()
        .pop_front()
        .unwrap_or_else(|| panic!("unexpected {op} call"))
}

/// Build a transaction-shaped response for scripting
pub(crate) fn authn_response(
    status: &str,
    token: Option<&str>,
    challenges: &[&str],
    access_token: Option<&str>,
) -> AuthnResponse {
    AuthnResponse {
        state_token: token.map(str::to_string),
        status: status.to_string(),
        challenges: challenges.iter().map(|s| (*s).to_string()).collect(),
        access_token: access_token.map(str::to_string),
    }
}

pub(crate) fn http_error(status: u16, message: &str) -> ApiError {
    ApiError::Http {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl IdentityApi for MockIdentityApi {
    async fn start_authentication(
        &self,
        _handle: &Handle,
        _params: &RedirectParams,
    ) -> Result<AuthnResponse, ApiError> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        let result = pop(&self.start_responses, "start_authentication");
        // Move the receiver out before awaiting so the guard is not held
        // across the suspension point.
        let gate = self.start_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn verify_password(
        &self,
        _token: &ContinuationToken,
        _password: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.calls.verify_password.fetch_add(1, Ordering::SeqCst);
        let result = pop(&self.verify_password_responses, "verify_password");
        let gate = self.verify_password_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn request_challenge_dispatch(
        &self,
        _token: &ContinuationToken,
        _method: ChallengeMethod,
    ) -> Result<(), ApiError> {
        self.calls.dispatch.fetch_add(1, Ordering::SeqCst);
        pop(&self.dispatch_responses, "request_challenge_dispatch")
    }

    async fn verify_challenge(
        &self,
        _token: &ContinuationToken,
        _method: ChallengeMethod,
        _code: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.calls.verify_challenge.fetch_add(1, Ordering::SeqCst);
        pop(&self.verify_challenge_responses, "verify_challenge")
    }

    async fn verify_password_step_up(&self, _password: &str) -> Result<AuthnResponse, ApiError> {
        self.calls.step_up.fetch_add(1, Ordering::SeqCst);
        pop(&self.step_up_responses, "verify_password_step_up")
    }

    async fn sign_up(&self, _request: &SignUpRequest) -> Result<AuthnResponse, ApiError> {
        self.calls.sign_up.fetch_add(1, Ordering::SeqCst);
        pop(&self.sign_up_responses, "sign_up")
    }

    async fn start_password_reset_authentication(
        &self,
        _handle: &Handle,
    ) -> Result<ResetResponse, ApiError> {
        self.calls.reset_start.fetch_add(1, Ordering::SeqCst);
        pop(&self.reset_start_responses, "start_password_reset_authentication")
    }

    async fn authenticate_reset_factor(
        &self,
        _token: &ContinuationToken,
        _proof: &ResetProof,
    ) -> Result<ResetResponse, ApiError> {
        self.calls.reset_factor.fetch_add(1, Ordering::SeqCst);
        pop(&self.reset_factor_responses, "authenticate_reset_factor")
    }

    async fn submit_password_reset(
        &self,
        _authorization_token: &AuthorizationToken,
        _verifier: &CredentialVerifier,
    ) -> Result<(), ApiError> {
        self.calls.reset_submit.fetch_add(1, Ordering::SeqCst);
        pop(&self.reset_submit_responses, "submit_password_reset")
    }

    async fn start_oauth(
        &self,
        _service: OAuthService,
        _purpose: OAuthPurpose,
        state: &str,
        _redirect_uri: Option<&str>,
    ) -> Result<OAuthEndpoint, ApiError> {
        self.calls.oauth_start.fetch_add(1, Ordering::SeqCst);
        // Echo the caller's state unless the script overrides it.
        match pop(&self.oauth_start_responses, "start_oauth") {
            Ok(mut endpoint) => {
                if endpoint.state.is_empty() {
                    endpoint.state = state.to_string();
                }
                Ok(endpoint)
            }
            Err(e) => Err(e),
        }
    }

    async fn complete_oauth(
        &self,
        _purpose: OAuthPurpose,
        _code: &str,
        _state: &str,
    ) -> Result<AuthnResponse, ApiError> {
        self.calls.oauth_complete.fetch_add(1, Ordering::SeqCst);
        pop(&self.oauth_complete_responses, "complete_oauth")
    }
}
