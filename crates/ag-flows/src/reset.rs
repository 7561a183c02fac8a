//! Password-reset sub-flow orchestrator
//!
//! A reset transaction proves control of an account through one factor
//! (an out-of-band contact token from an emailed link, or a challenge
//! code) and exchanges that proof for a single-use authorization token,
//! which is then spent on the actual password change. The authorization
//! token is consumed locally before the submit call goes out, so an
//! ambiguous network failure can never lead to a silent second submission.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use ag_client::{IdentityApi, ResetProof, ResetResponse};
use ag_types::{
    AuthorizationToken, ChallengeMethod, ContactToken, ContinuationToken, FlowError, FlowResult,
    Handle, ValidationReason,
};
use ag_utils::{derive_verifier, password_strength_score};

use crate::classify;

const MIN_PASSWORD_SCORE: u8 = 2;

/// Where the reset transaction stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPhase {
    /// No reset in progress
    #[default]
    Start,
    /// A factor proof is required
    AwaitingChallenge,
    /// Factor satisfied, authorization token held
    FactorVerified,
    /// New password accepted by the server
    Completed,
}

/// Read-only snapshot for the embedding UI
#[derive(Debug, Clone)]
pub struct ResetView {
    pub phase: ResetPhase,
    pub handle: Option<Handle>,
    pub available_challenges: Vec<ChallengeMethod>,
    pub selected_challenge: Option<ChallengeMethod>,
}

#[derive(Debug, Default)]
struct Inner {
    epoch: u64,
    phase: ResetPhase,
    token: Option<ContinuationToken>,
    handle: Option<Handle>,
    available_challenges: Vec<ChallengeMethod>,
    selected_challenge: Option<ChallengeMethod>,
    authorization_token: Option<AuthorizationToken>,
}

impl Inner {
    fn reset(&mut self) {
        let epoch = self.epoch;
        *self = Self {
            epoch,
            ..Self::default()
        };
    }
}

pub struct PasswordResetOrchestrator {
    api: Arc<dyn IdentityApi>,
    inner: RwLock<Inner>,
}

impl PasswordResetOrchestrator {
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self {
            api,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn snapshot(&self) -> ResetView {
        let inner = self.inner.read();
        ResetView {
            phase: inner.phase,
            handle: inner.handle.clone(),
            available_challenges: inner.available_challenges.clone(),
            selected_challenge: inner.selected_challenge,
        }
    }

    /// Begin a reset for a handle.
    ///
    /// On success the first offered challenge is selected automatically,
    /// and an `sms_otp` selection immediately triggers the code dispatch,
    /// so the common case needs no extra round of user interaction. A
    /// failed auto-dispatch does not fail the start: the returned phase
    /// reflects the advanced transaction and the dispatch can be
    /// re-triggered with [`Self::select_challenge`].
    pub async fn start(&self, raw_handle: &str) -> FlowResult<ResetPhase> {
        let handle = Handle::parse(raw_handle)?;

        let epoch = {
            let mut inner = self.inner.write();
            if inner.phase != ResetPhase::Start {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            inner.epoch += 1;
            inner.epoch
        };

        info!(handle = %handle, "starting password reset");
        let response = match self.api.start_password_reset_authentication(&handle).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "reset start failed");
                return Err(classify::classify_reset_handle(&err));
            }
        };

        let phase = self.adopt_with_handle(epoch, Some(handle), response)?;

        // Auto-select the first offered challenge; SMS starts dispatching
        // right away. The transaction has already advanced, so a failed
        // auto-dispatch must not read as a failed start: the selection
        // stays and the caller can re-trigger it with `select_challenge`.
        let auto = {
            let inner = self.inner.read();
            if inner.epoch == epoch && inner.phase == ResetPhase::AwaitingChallenge {
                inner.available_challenges.first().copied()
            } else {
                None
            }
        };
        if let Some(method) = auto {
            if let Err(err) = self.select_challenge(method).await {
                warn!(error = %err, "auto-selected challenge dispatch failed");
            }
        }
        Ok(phase)
    }

    /// Choose a different factor from the offered challenge list
    pub async fn select_challenge(&self, method: ChallengeMethod) -> FlowResult<()> {
        let token = {
            let mut inner = self.inner.write();
            if inner.phase != ResetPhase::AwaitingChallenge {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            if !inner.available_challenges.contains(&method) {
                return Err(FlowError::Validation(ValidationReason::ChallengeNotOffered));
            }
            inner.selected_challenge = Some(method);
            inner
                .token
                .clone()
                .ok_or_else(|| FlowError::Protocol("missing continuation token".to_string()))?
        };

        if method == ChallengeMethod::SmsOtp {
            if let Err(err) = self.api.request_challenge_dispatch(&token, method).await {
                warn!(error = %err, "reset sms dispatch failed");
                return Err(classify::classify_dispatch(&err));
            }
        }
        Ok(())
    }

    /// Prove the factor with the code for the selected challenge
    pub async fn verify_challenge_code(&self, code: &str) -> FlowResult<ResetPhase> {
        let (epoch, token, method) = {
            let inner = self.inner.read();
            if inner.phase != ResetPhase::AwaitingChallenge {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            let method = inner
                .selected_challenge
                .ok_or(FlowError::Validation(ValidationReason::NoChallengeSelected))?;
            let token = inner
                .token
                .clone()
                .ok_or_else(|| FlowError::Protocol("missing continuation token".to_string()))?;
            (inner.epoch, token, method)
        };

        let proof = ResetProof::Challenge {
            method,
            code: code.to_string(),
        };
        match self.api.authenticate_reset_factor(&token, &proof).await {
            Ok(response) => {
                // Factor not satisfied but no error: the code was wrong.
                if !response.authenticated {
                    self.adopt(epoch, response)?;
                    return Err(FlowError::AuthFailure(classify::wrong_code(method)));
                }
                self.adopt(epoch, response)
            }
            Err(err) => Err(classify::classify_reset_factor(Some(method), &err)),
        }
    }

    /// Prove the factor with the out-of-band contact token carried by an
    /// emailed reset link
    pub async fn verify_contact_token(&self, contact_token: ContactToken) -> FlowResult<ResetPhase> {
        let (epoch, token) = {
            let inner = self.inner.read();
            if inner.phase != ResetPhase::AwaitingChallenge {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            let token = inner
                .token
                .clone()
                .ok_or_else(|| FlowError::Protocol("missing continuation token".to_string()))?;
            (inner.epoch, token)
        };

        let proof = ResetProof::Contact(contact_token);
        match self.api.authenticate_reset_factor(&token, &proof).await {
            Ok(response) => {
                if !response.authenticated {
                    return Err(FlowError::LinkExpired);
                }
                self.adopt(epoch, response)
            }
            Err(err) => Err(classify::classify_reset_factor(None, &err)),
        }
    }

    /// Spend the authorization token on the actual password change.
    ///
    /// The two password fields are compared and the strength floor applied
    /// locally, before any network traffic. The token is consumed before
    /// the call goes out; once spent it is gone even if the call fails.
    pub async fn reset_password(&self, new_password: &str, confirm: &str) -> FlowResult<ResetPhase> {
        if new_password != confirm {
            return Err(FlowError::Validation(ValidationReason::PasswordMismatch));
        }
        if password_strength_score(new_password) < MIN_PASSWORD_SCORE {
            return Err(FlowError::Validation(ValidationReason::WeakPassword));
        }
        let verifier = derive_verifier(new_password)?;

        let (epoch, authorization_token) = {
            let mut inner = self.inner.write();
            if inner.phase != ResetPhase::FactorVerified {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            // Single-use: take it out before the network call.
            let token = inner
                .authorization_token
                .take()
                .ok_or(FlowError::LinkExpired)?;
            (inner.epoch, token)
        };

        match self
            .api
            .submit_password_reset(&authorization_token, &verifier)
            .await
        {
            Ok(()) => {
                let mut inner = self.inner.write();
                if inner.epoch == epoch {
                    inner.reset();
                    inner.phase = ResetPhase::Completed;
                }
                info!("password reset completed");
                Ok(ResetPhase::Completed)
            }
            Err(err) => Err(classify::classify_reset_submit(&err)),
        }
    }

    /// Abandon the reset and discard all held tokens
    pub fn cancel(&self) {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.reset();
        debug!("password reset cancelled");
    }

    /// Adopt a reset response, unless this transaction has been superseded
    fn adopt(&self, epoch: u64, response: ResetResponse) -> FlowResult<ResetPhase> {
        self.adopt_with_handle(epoch, None, response)
    }

    /// [`Self::adopt`], additionally recording the handle. Applied with the
    /// rest of the response so mid-call reads see pre-call state.
    fn adopt_with_handle(
        &self,
        epoch: u64,
        handle: Option<Handle>,
        response: ResetResponse,
    ) -> FlowResult<ResetPhase> {
        let challenges = response.challenge_methods()?;
        let token = response.continuation_token();
        let authorization_token = response.authorization_token();

        if response.authenticated && authorization_token.is_none() {
            return Err(FlowError::Protocol(
                "authenticated without reset_password_token".to_string(),
            ));
        }
        if !response.authenticated && token.is_none() {
            return Err(FlowError::Protocol("missing state_token".to_string()));
        }

        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            debug!("discarding response for superseded reset");
            return Ok(inner.phase);
        }

        if let Some(handle) = handle {
            inner.handle = Some(handle);
        }
        if response.authenticated {
            inner.phase = ResetPhase::FactorVerified;
            inner.token = None;
            inner.available_challenges.clear();
            inner.selected_challenge = None;
            inner.authorization_token = authorization_token;
        } else {
            inner.phase = ResetPhase::AwaitingChallenge;
            inner.token = token;
            inner.selected_challenge = inner
                .selected_challenge
                .filter(|m| challenges.contains(m));
            inner.available_challenges = challenges;
        }
        Ok(inner.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_api::{http_error, MockIdentityApi};
    use ag_types::AuthFailureReason;
    use std::sync::atomic::Ordering;

    fn reset_response(
        token: Option<&str>,
        authenticated: bool,
        challenges: &[&str],
        authorization_token: Option<&str>,
    ) -> ResetResponse {
        ResetResponse {
            state_token: token.map(str::to_string),
            authenticated,
            challenges: challenges.iter().map(|s| (*s).to_string()).collect(),
            authorization_token: authorization_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_sms_reset_happy_path() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["sms_otp", "totp"], None),
        ));
        mock.dispatch_responses.lock().push_back(Ok(()));
        mock.reset_factor_responses.lock().push_back(Ok(
            reset_response(None, true, &[], Some("cap-1")),
        ));
        mock.reset_submit_responses.lock().push_back(Ok(()));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        let phase = orch.start("+15551234567").await.unwrap();
        assert_eq!(phase, ResetPhase::AwaitingChallenge);
        // First challenge auto-selected, SMS dispatched once.
        assert_eq!(
            orch.snapshot().selected_challenge,
            Some(ChallengeMethod::SmsOtp)
        );
        assert_eq!(mock.calls.dispatch.load(Ordering::SeqCst), 1);

        let phase = orch.verify_challenge_code("123456").await.unwrap();
        assert_eq!(phase, ResetPhase::FactorVerified);

        let phase = orch
            .reset_password("a strong password 1", "a strong password 1")
            .await
            .unwrap();
        assert_eq!(phase, ResetPhase::Completed);
        assert_eq!(mock.calls.reset_submit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contact_token_path_skips_dispatch() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses.lock().push_back(Ok(
            reset_response(None, true, &[], Some("cap-1")),
        ));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();
        assert_eq!(mock.calls.dispatch.load(Ordering::SeqCst), 0);

        let phase = orch
            .verify_contact_token(ContactToken::new("link-token"))
            .await
            .unwrap();
        assert_eq!(phase, ResetPhase::FactorVerified);
    }

    #[tokio::test]
    async fn test_mismatched_passwords_rejected_locally() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses.lock().push_back(Ok(
            reset_response(None, true, &[], Some("cap-1")),
        ));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();
        orch.verify_challenge_code("000000").await.unwrap();

        let err = orch
            .reset_password("a strong password 1", "a different one")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation(ValidationReason::PasswordMismatch)
        );
        // Nothing left the client, and the token is still spendable.
        assert_eq!(mock.calls.reset_submit.load(Ordering::SeqCst), 0);
        assert_eq!(orch.snapshot().phase, ResetPhase::FactorVerified);
    }

    #[tokio::test]
    async fn test_weak_password_rejected_locally() {
        let mock = Arc::new(MockIdentityApi::new());
        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        // Phase check comes after the local password checks.
        let err = orch.reset_password("weak", "weak").await.unwrap_err();
        assert_eq!(err, FlowError::Validation(ValidationReason::WeakPassword));
        assert_eq!(mock.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses
            .lock()
            .push_back(Err(http_error(404, "no user")));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        let err = orch.start("nobody@example.com").await.unwrap_err();
        assert_eq!(err, FlowError::HandleNotFound);
        assert_eq!(orch.snapshot().phase, ResetPhase::Start);
        assert!(orch.snapshot().handle.is_none());
    }

    #[tokio::test]
    async fn test_expired_link_at_factor_stage() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses
            .lock()
            .push_back(Err(http_error(404, "gone")));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();

        let err = orch
            .verify_contact_token(ContactToken::new("stale-link"))
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::LinkExpired);
    }

    #[tokio::test]
    async fn test_wrong_reset_code_is_retryable() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses
            .lock()
            .push_back(Err(http_error(403, "bad pin")));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();

        let err = orch.verify_challenge_code("000000").await.unwrap_err();
        assert_eq!(
            err,
            FlowError::AuthFailure(AuthFailureReason::InvalidTotpPin)
        );
        assert_eq!(orch.snapshot().phase, ResetPhase::AwaitingChallenge);
    }

    #[tokio::test]
    async fn test_failed_auto_dispatch_does_not_fail_start() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["sms_otp"], None),
        ));
        mock.dispatch_responses
            .lock()
            .push_back(Err(http_error(500, "sms provider down")));
        mock.dispatch_responses.lock().push_back(Ok(()));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        // The transaction advanced, so the start succeeds even though the
        // auto-dispatch did not.
        let phase = orch.start("+15551234567").await.unwrap();
        assert_eq!(phase, ResetPhase::AwaitingChallenge);
        let view = orch.snapshot();
        assert_eq!(view.selected_challenge, Some(ChallengeMethod::SmsOtp));

        // The caller can re-trigger the dispatch explicitly.
        orch.select_challenge(ChallengeMethod::SmsOtp).await.unwrap();
        assert_eq!(mock.calls.dispatch.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authorization_token_is_single_use() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses.lock().push_back(Ok(
            reset_response(None, true, &[], Some("cap-1")),
        ));
        mock.reset_submit_responses
            .lock()
            .push_back(Err(http_error(500, "timeout upstream")));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();
        orch.verify_challenge_code("000000").await.unwrap();

        let err = orch
            .reset_password("a strong password 1", "a strong password 1")
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Unknown(_)));

        // The token was consumed by the first attempt; a retry fails
        // locally instead of resubmitting.
        let err = orch
            .reset_password("a strong password 1", "a strong password 1")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::LinkExpired);
        assert_eq!(mock.calls.reset_submit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_authorization_token() {
        let mock = Arc::new(MockIdentityApi::new());
        mock.reset_start_responses.lock().push_back(Ok(
            reset_response(Some("t1"), false, &["totp"], None),
        ));
        mock.reset_factor_responses.lock().push_back(Ok(
            reset_response(None, true, &[], Some("cap-1")),
        ));

        let orch = PasswordResetOrchestrator::new(Arc::clone(&mock) as Arc<dyn IdentityApi>);
        orch.start("user@example.com").await.unwrap();
        orch.verify_challenge_code("000000").await.unwrap();

        orch.cancel();
        assert_eq!(orch.snapshot().phase, ResetPhase::Start);
        let err = orch
            .reset_password("a strong password 1", "a strong password 1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation(ValidationReason::InvalidTransactionState)
        );
    }
}
