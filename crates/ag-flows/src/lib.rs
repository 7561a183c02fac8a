//! Authentication flow orchestrators for AuthGate
//!
//! Each orchestrator owns one transaction kind and drives it through the
//! server-provided step sequence: the main authentication transaction
//! ([`AuthnOrchestrator`]), the password-reset sub-flow
//! ([`PasswordResetOrchestrator`]) and the OAuth linking handshake
//! ([`OAuthLinkOrchestrator`]). The continuation token is the only
//! authority for server-side progress: no operation transitions locally,
//! every one round-trips and adopts exactly the status the server returns.

pub mod authn;
pub mod classify;
pub mod oauth;
pub mod reset;
pub mod session;

#[cfg(test)]
pub(crate) mod mock_api;

pub use authn::{AuthnOrchestrator, FlowState, TransactionView};
pub use oauth::{
    HandshakeStore, MemoryHandshakeStore, OAuthLinkOrchestrator, PopupHandle, RedirectSurface,
    OAUTH_STATE_STORAGE_KEY,
};
pub use reset::{PasswordResetOrchestrator, ResetPhase, ResetView};
pub use session::SessionStore;
