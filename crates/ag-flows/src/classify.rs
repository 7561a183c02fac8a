//! HTTP error classification, one function per external operation
//!
//! Every call site goes through exactly one of these, so the taxonomy is
//! applied uniformly: a 429 is always `RateLimited` (never folded into a
//! wrong-code failure), a handle-stage 404 is `HandleNotFound` while a
//! later-stage 404 is `LinkExpired`, and anything unrecognized falls
//! through to `Unknown` carrying the transport detail for the log.

use ag_client::ApiError;
use ag_types::{AuthFailureReason, ChallengeMethod, FlowError, ValidationReason};

fn rate_limited(err: &ApiError) -> FlowError {
    // The server marks hard limits with a "too many ..." message.
    FlowError::RateLimited {
        reach_limit: err.message().contains("many"),
    }
}

/// `start_authentication`: 403 is a locked account, 404 an unknown handle.
/// Anything else means the attempt never began (caller leaves the
/// transaction Idle).
pub fn classify_start(err: &ApiError) -> FlowError {
    match err.status() {
        Some(403) => FlowError::AuthFailure(AuthFailureReason::AccountLocked),
        Some(404) => FlowError::HandleNotFound,
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `verify_password`: a 403 is a wrong password, retryable in place
pub fn classify_verify_password(err: &ApiError) -> FlowError {
    match err.status() {
        Some(403) => FlowError::AuthFailure(AuthFailureReason::IncorrectPassword),
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `verify_challenge`: wrong codes are tagged by the selected method so
/// each renders its own message
pub fn classify_verify_challenge(method: ChallengeMethod, err: &ApiError) -> FlowError {
    match err.status() {
        Some(403) => FlowError::AuthFailure(wrong_code(method)),
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

pub(crate) fn wrong_code(method: ChallengeMethod) -> AuthFailureReason {
    match method {
        ChallengeMethod::SmsOtp => AuthFailureReason::InvalidSmsCode,
        ChallengeMethod::Totp => AuthFailureReason::InvalidTotpPin,
        ChallengeMethod::BackupCode => AuthFailureReason::InvalidBackupCode,
    }
}

/// `request_challenge_dispatch`: a failed SMS send is reported but does
/// not invalidate the transaction, so nothing here maps to a terminal kind
pub fn classify_dispatch(err: &ApiError) -> FlowError {
    match err.status() {
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `sign_up`: 409 means the handle is taken; a 400 is the server
/// rejecting the contact shape
pub fn classify_sign_up(err: &ApiError) -> FlowError {
    match err.status() {
        Some(409) => FlowError::HandleAlreadyExists,
        Some(400) => {
            let message = err.message();
            if message.contains("phone") {
                FlowError::Validation(ValidationReason::InvalidPhone)
            } else if message.contains("email") {
                FlowError::Validation(ValidationReason::InvalidEmail)
            } else {
                FlowError::Unknown(err.to_string())
            }
        }
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `verify_password_step_up`: same credential failure shape as the
/// primary verification
pub fn classify_step_up(err: &ApiError) -> FlowError {
    classify_verify_password(err)
}

/// `start_password_reset_authentication`: a handle-stage 404 is
/// "no such contact"
pub fn classify_reset_handle(err: &ApiError) -> FlowError {
    match err.status() {
        Some(403) => FlowError::AuthFailure(AuthFailureReason::AccountLocked),
        Some(404) => FlowError::HandleNotFound,
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `authenticate_reset_factor`: a 404 here arrives after a token was
/// already issued, so it means the link is invalid or expired, not that
/// the contact is unknown
pub fn classify_reset_factor(method: Option<ChallengeMethod>, err: &ApiError) -> FlowError {
    match err.status() {
        Some(404) => FlowError::LinkExpired,
        Some(403) => match method {
            Some(m) => FlowError::AuthFailure(wrong_code(m)),
            None => FlowError::LinkExpired,
        },
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `submit_password_reset`: the authorization token is single-use, so a
/// 403/404 means it was already spent or expired
pub fn classify_reset_submit(err: &ApiError) -> FlowError {
    match err.status() {
        Some(403) | Some(404) => FlowError::LinkExpired,
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}

/// `start_oauth` / `complete_oauth`
pub fn classify_oauth(err: &ApiError) -> FlowError {
    match err.status() {
        Some(429) => rate_limited(err),
        _ => FlowError::Unknown(err.to_string()),
    }
}
