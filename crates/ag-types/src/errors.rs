//! Error taxonomy shared by every flow
//!
//! Classification happens once, at the orchestrator boundary, immediately
//! after each network call; every caught error either lands in one of the
//! kinds below or falls through to `Unknown`. The UI renders an error by
//! its message key, so each kind maps to exactly one key per context and a
//! rate-limit rejection can never masquerade as a wrong-code failure.

use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

/// Local, pre-network validation failures.
///
/// These are raised before any request is issued and never mutate the
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// Handle is empty or whitespace
    EmptyHandle,
    /// Handle looked like an email but is not shaped like one
    InvalidEmail,
    /// Handle looked like a phone number but is not shaped like one
    InvalidPhone,
    /// Password strength score below the acceptance threshold
    WeakPassword,
    /// Password and confirmation differ
    PasswordMismatch,
    /// No second-factor method has been selected
    NoChallengeSelected,
    /// The chosen method is not in the server's offered challenge list
    ChallengeNotOffered,
    /// Operation invoked in a state that does not permit it
    /// (terminal states are sinks)
    InvalidTransactionState,
}

/// Server rejected a credential or code; retryable within the same
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    IncorrectPassword,
    InvalidSmsCode,
    InvalidTotpPin,
    InvalidBackupCode,
    AccountLocked,
}

/// Which screen the error will be rendered on; picks the message key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageContext {
    SignIn,
    /// Sign-in where the embedding page also offers self-registration,
    /// so an unknown handle gets a "register instead?" message
    SignInOrRegister,
    Register,
    Mfa,
    Reset,
    StepUp,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("validation failed: {0:?}")]
    Validation(ValidationReason),

    #[error("authentication failed: {0:?}")]
    AuthFailure(AuthFailureReason),

    #[error("rate limited (reach_limit: {reach_limit})")]
    RateLimited {
        /// Server message matched the hard-limit pattern, as opposed to a
        /// transient 429
        reach_limit: bool,
    },

    #[error("handle not found")]
    HandleNotFound,

    #[error("handle already exists")]
    HandleAlreadyExists,

    #[error("link invalid or expired")]
    LinkExpired,

    #[error("OAuth anti-forgery state mismatch")]
    StateMismatch,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl FlowError {
    /// Stable localization key for this error in the given context.
    ///
    /// `Unknown` and `Protocol` deliberately collapse to the opaque key:
    /// their detail goes to the log, never to the user.
    pub fn message_key(&self, context: MessageContext) -> &'static str {
        use AuthFailureReason as A;
        use MessageContext as C;
        use ValidationReason as V;

        match self {
            Self::Validation(reason) => match reason {
                V::EmptyHandle => "input.error.invalid_contact",
                V::InvalidEmail => "register.input.error.invalid_email",
                V::InvalidPhone => "register.input.error.invalid_phone",
                V::WeakPassword => match context {
                    C::Register => "register.input.error.requires_better_password_strength",
                    _ => "change_password.input.error.requires_better_password_strength",
                },
                V::PasswordMismatch => "change_password.input.error.invalid_confirm_password",
                V::NoChallengeSelected
                | V::ChallengeNotOffered
                | V::InvalidTransactionState => "error.unknown",
            },
            Self::AuthFailure(reason) => match reason {
                A::IncorrectPassword => "sign_in.input.error.incorrect_password",
                A::InvalidSmsCode => "sign_in.input.error.invalid_sms_code",
                A::InvalidTotpPin => "sign_in.input.error.invalid_totp_pin",
                A::InvalidBackupCode => "sign_in.input.error.invalid_backup_code",
                A::AccountLocked => "sign_in.input.error.user_is_locked",
            },
            Self::RateLimited { reach_limit } => {
                if *reach_limit {
                    "reset_password.text.error.reach_limit"
                } else {
                    "error.too_frequent"
                }
            }
            Self::HandleNotFound => match context {
                C::SignInOrRegister => "sign_in.input.error.contact_not_found_register_hint",
                C::Reset => "reset_password.input.error.no_contact",
                _ => "sign_in.input.error.contact_not_found",
            },
            Self::HandleAlreadyExists => "register.input.error.contact_already_exists",
            Self::LinkExpired => "reset_password.text.error.invalid_reset_password",
            Self::StateMismatch => "error.oauth_state_mismatch",
            Self::Protocol(_) | Self::Unknown(_) => "error.unknown",
        }
    }

    /// Whether the caller may retry the same operation within the current
    /// transaction (wrong credential/code, or a transient rate limit)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure(
                AuthFailureReason::IncorrectPassword
                    | AuthFailureReason::InvalidSmsCode
                    | AuthFailureReason::InvalidTotpPin
                    | AuthFailureReason::InvalidBackupCode
            ) | Self::RateLimited { .. }
        )
    }
}

impl From<FlowError> for String {
    fn from(err: FlowError) -> String {
        err.to_string()
    }
}
