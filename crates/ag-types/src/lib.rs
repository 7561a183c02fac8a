//! Shared protocol types and error taxonomy for AuthGate

pub mod errors;
pub mod handle;
pub mod oauth;
pub mod status;
pub mod tokens;

pub use errors::{AuthFailureReason, FlowError, FlowResult, MessageContext, ValidationReason};
pub use handle::{Handle, HandleKind};
pub use oauth::{OAuthPurpose, OAuthService};
pub use status::{ChallengeMethod, TransactionStatus};
pub use tokens::{AccessToken, AuthorizationToken, ContactToken, ContinuationToken};
