//! Authentication transaction orchestrator
//!
//! Owns the current transaction's continuation token and drives it through
//! the server-provided step sequence (primary factor, optional second
//! factor, success). The client never infers a transition locally: every
//! operation round-trips and adopts exactly the status the server returns,
//! so it cannot desynchronize from server-side rate limiting, lockouts or
//! expiry.
//!
//! Mid-call the local state is exactly as it was before the call (no
//! optimistic transitions). `cancel()` and `start()` bump an epoch
//! counter; a response that comes back for an earlier epoch is discarded
//! instead of clobbering the fresh transaction.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use ag_client::{sign_up_request, AuthnResponse, IdentityApi, RedirectParams};
use ag_types::{
    AuthFailureReason, ChallengeMethod, ContinuationToken, FlowError, FlowResult, Handle,
    TransactionStatus, ValidationReason,
};
use ag_utils::{derive_verifier, password_strength_score};

use crate::classify;
use crate::session::SessionStore;

/// Minimum local strength score accepted for a new password
const MIN_PASSWORD_SCORE: u8 = 2;

/// Local view of where the transaction stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// No transaction in progress
    #[default]
    Idle,
    AwaitingPrimary,
    AwaitingSecondFactor,
    Success,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl From<TransactionStatus> for FlowState {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::AwaitingPrimary => Self::AwaitingPrimary,
            TransactionStatus::AwaitingSecondFactor => Self::AwaitingSecondFactor,
            TransactionStatus::Success => Self::Success,
            TransactionStatus::Failed => Self::Failed,
        }
    }
}

/// Read-only snapshot for the embedding UI
#[derive(Debug, Clone)]
pub struct TransactionView {
    pub state: FlowState,
    pub handle: Option<Handle>,
    pub available_challenges: Vec<ChallengeMethod>,
    pub selected_challenge: Option<ChallengeMethod>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Bumped by `start` and `cancel`; responses carrying an older epoch
    /// are discarded
    epoch: u64,
    state: FlowState,
    token: Option<ContinuationToken>,
    handle: Option<Handle>,
    available_challenges: Vec<ChallengeMethod>,
    selected_challenge: Option<ChallengeMethod>,
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

pub struct AuthnOrchestrator {
    api: Arc<dyn IdentityApi>,
    session: Arc<SessionStore>,
    inner: RwLock<Inner>,
}

impl AuthnOrchestrator {
    pub fn new(api: Arc<dyn IdentityApi>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn snapshot(&self) -> TransactionView {
        let inner = self.inner.read();
        TransactionView {
            state: inner.state,
            handle: inner.handle.clone(),
            available_challenges: inner.available_challenges.clone(),
            selected_challenge: inner.selected_challenge,
        }
    }

    /// Begin a transaction for a handle.
    ///
    /// 403 means the account is locked and 404 that the handle is unknown;
    /// both fail the transaction. Any other failure leaves it Idle, because
    /// the attempt never began. Local state is untouched while the call is
    /// in flight: a concurrent `snapshot` sees the pre-call state.
    pub async fn start(&self, raw_handle: &str, params: &RedirectParams) -> FlowResult<FlowState> {
        let handle = Handle::parse(raw_handle)?;

        let epoch = {
            let mut inner = self.inner.write();
            if inner.state != FlowState::Idle {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            inner.epoch += 1;
            inner.epoch
        };

        info!(handle = %handle, "starting authentication transaction");
        match self.api.start_authentication(&handle, params).await {
            Ok(response) => self.adopt_with_handle(epoch, Some(handle), response),
            Err(err) => {
                let classified = classify::classify_start(&err);
                if matches!(
                    classified,
                    FlowError::AuthFailure(AuthFailureReason::AccountLocked)
                        | FlowError::HandleNotFound
                ) {
                    let mut inner = self.inner.write();
                    if inner.epoch == epoch {
                        inner.state = FlowState::Failed;
                        inner.token = None;
                        inner.handle = Some(handle);
                    }
                }
                warn!(error = %err, "start failed");
                Err(classified)
            }
        }
    }

    /// Adopt a transaction obtained outside the password flow (an OAuth
    /// completion). The transaction must be Idle; the response then drives
    /// it exactly as a `start` response would.
    pub(crate) fn resume(&self, response: AuthnResponse) -> FlowResult<FlowState> {
        let epoch = {
            let mut inner = self.inner.write();
            if inner.state != FlowState::Idle {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            inner.epoch += 1;
            inner.epoch
        };
        self.adopt_with_handle(epoch, None, response)
    }

    /// Submit the primary factor.
    ///
    /// A wrong password keeps the transaction at AwaitingPrimary with a
    /// retryable error; nothing is reset.
    pub async fn verify_password(&self, password: &str) -> FlowResult<FlowState> {
        let (epoch, token) = self.precondition(FlowState::AwaitingPrimary)?;

        match self.api.verify_password(&token, password).await {
            Ok(response) => {
                // The original protocol reports a wrong password by keeping
                // the transaction at the primary step.
                if response.status()? == TransactionStatus::AwaitingPrimary {
                    self.adopt(epoch, response)?;
                    return Err(FlowError::AuthFailure(AuthFailureReason::IncorrectPassword));
                }
                self.adopt(epoch, response)
            }
            Err(err) => Err(classify::classify_verify_password(&err)),
        }
    }

    /// Choose a second-factor method from the offered challenge list.
    ///
    /// Selecting `sms_otp` also triggers the out-of-band code dispatch;
    /// dispatch is not deduplicated, and a dispatch failure is reported
    /// without invalidating the transaction (the selection stays).
    pub async fn select_challenge(&self, method: ChallengeMethod) -> FlowResult<()> {
        let token = {
            let mut inner = self.inner.write();
            if inner.state != FlowState::AwaitingSecondFactor {
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
                warn!(error = %err, "sms dispatch failed");
                return Err(classify::classify_dispatch(&err));
            }
        }
        Ok(())
    }

    /// Submit the code for the selected second factor
    pub async fn verify_second_factor(&self, code: &str) -> FlowResult<FlowState> {
        let (epoch, token, method) = {
            let inner = self.inner.read();
            if inner.state != FlowState::AwaitingSecondFactor {
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

        match self.api.verify_challenge(&token, method, code).await {
            Ok(response) => match response.status()? {
                // Still at the second factor: the code was wrong.
                TransactionStatus::AwaitingSecondFactor => {
                    self.adopt(epoch, response)?;
                    Err(FlowError::AuthFailure(classify::wrong_code(method)))
                }
                TransactionStatus::AwaitingPrimary => Err(FlowError::Protocol(
                    "second-factor verification regressed to primary".to_string(),
                )),
                _ => self.adopt(epoch, response),
            },
            Err(err) => Err(classify::classify_verify_challenge(method, &err)),
        }
    }

    /// Register a new account for a handle.
    ///
    /// Validation (handle shape, password strength) happens before any
    /// network call; the plaintext is replaced by a credential verifier
    /// before it leaves this method.
    pub async fn sign_up(
        &self,
        raw_handle: &str,
        password: &str,
        params: &RedirectParams,
    ) -> FlowResult<FlowState> {
        let handle = Handle::parse(raw_handle)?;
        if password_strength_score(password) < MIN_PASSWORD_SCORE {
            return Err(FlowError::Validation(ValidationReason::WeakPassword));
        }
        let verifier = derive_verifier(password)?;

        let epoch = {
            let mut inner = self.inner.write();
            if inner.state != FlowState::Idle {
                return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
            }
            inner.epoch += 1;
            inner.epoch
        };

        let request = sign_up_request(&handle, verifier, params.redirect_uri.clone());
        match self.api.sign_up(&request).await {
            Ok(response) => self.adopt_with_handle(epoch, Some(handle), response),
            Err(err) => Err(classify::classify_sign_up(&err)),
        }
    }

    /// Re-prove the primary factor for the established session before a
    /// sensitive action
    pub async fn verify_password_step_up(&self, password: &str) -> FlowResult<()> {
        if !self.session.is_authenticated() {
            return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
        }
        match self.api.verify_password_step_up(password).await {
            Ok(response) => {
                if let Some(token) = response.access_token() {
                    self.session.set(token);
                }
                Ok(())
            }
            Err(err) => Err(classify::classify_step_up(&err)),
        }
    }

    /// Abandon the transaction: resets to Idle and discards the
    /// continuation token. Cannot abort an in-flight call, but its late
    /// response will be discarded by the epoch check.
    pub fn cancel(&self) {
        let mut inner = self.inner.write();
        inner.epoch += 1;
        inner.reset();
        debug!("transaction cancelled");
    }

    /// Check the precondition for a step operation and capture what the
    /// network call needs. Terminal states are sinks: they reject here,
    /// before any request is issued.
    fn precondition(&self, expected: FlowState) -> FlowResult<(u64, ContinuationToken)> {
        let inner = self.inner.read();
        if inner.state != expected {
            return Err(FlowError::Validation(ValidationReason::InvalidTransactionState));
        }
        let token = inner
            .token
            .clone()
            .ok_or_else(|| FlowError::Protocol("missing continuation token".to_string()))?;
        Ok((inner.epoch, token))
    }

    /// Adopt a server response, unless the transaction it belongs to has
    /// been superseded in the meantime.
    fn adopt(&self, epoch: u64, response: AuthnResponse) -> FlowResult<FlowState> {
        self.adopt_with_handle(epoch, None, response)
    }

    /// [`Self::adopt`], additionally recording the handle the transaction
    /// was started for. The handle lands together with the rest of the
    /// response, never earlier, so mid-call reads see pre-call state.
    fn adopt_with_handle(
        &self,
        epoch: u64,
        handle: Option<Handle>,
        response: AuthnResponse,
    ) -> FlowResult<FlowState> {
        // Parse before touching state: a protocol error must not half-apply.
        let status = response.status()?;
        let challenges = if status == TransactionStatus::AwaitingSecondFactor {
            response.challenge_methods()?
        } else {
            Vec::new()
        };
        let token = response.continuation_token();
        if token.is_none() && !status.is_terminal() {
            return Err(FlowError::Protocol("missing state_token".to_string()));
        }

        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            debug!("discarding response for superseded transaction");
            return Ok(inner.state);
        }

        if let Some(handle) = handle {
            inner.handle = Some(handle);
        }
        inner.state = status.into();
        match status {
            TransactionStatus::AwaitingPrimary => {
                inner.token = token;
                inner.available_challenges.clear();
                inner.selected_challenge = None;
            }
            TransactionStatus::AwaitingSecondFactor => {
                inner.token = token;
                // Keep the selection if the server still offers it.
                inner.selected_challenge = inner
                    .selected_challenge
                    .filter(|m| challenges.contains(m));
                inner.available_challenges = challenges;
            }
            TransactionStatus::Success => {
                if let Some(access_token) = response.access_token() {
                    self.session.set(access_token);
                }
                inner.reset();
                inner.state = FlowState::Success;
            }
            TransactionStatus::Failed => {
                inner.token = None;
                inner.available_challenges.clear();
                inner.selected_challenge = None;
            }
        }
        Ok(inner.state)
    }
}
