//! OAuth linking handshake orchestrator
//!
//! Starting a handshake races a browser constraint: the interactive
//! redirect surface (popup window) must be acquired synchronously in the
//! user-gesture call stack, before the first suspension point, or the
//! environment blocks it. So `begin` opens the surface first, then asks
//! the server for the authorization endpoint and navigates the
//! already-open surface there.
//!
//! The anti-forgery state is generated locally, parked in ephemeral
//! storage under [`OAUTH_STATE_STORAGE_KEY`] so it survives the provider
//! round-trip, and compared in constant time against the echoed value
//! before the authorization code is trusted. A verified completion is
//! handed to the authentication orchestrator, which adopts it like any
//! other transaction response: a social sign-in that still requires a
//! second factor continues through the normal MFA operations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use ag_client::IdentityApi;
use ag_types::{FlowError, FlowResult, OAuthPurpose, OAuthService};
use ag_utils::generate_anti_forgery_state;

use crate::authn::{AuthnOrchestrator, FlowState};
use crate::classify;

/// Namespace key the anti-forgery state is parked under between the
/// outbound navigation and the provider's return redirect
pub const OAUTH_STATE_STORAGE_KEY: &str = "io.authgate.temporary.oauth_state";

/// An open interactive-redirect resource (popup window or equivalent)
pub trait PopupHandle: Send {
    /// Point the surface at the provider's authorization endpoint
    fn navigate(&mut self, url: &str);
    /// Dismiss the surface; used on both success and failure paths
    fn close(&mut self);
}

/// Environment hook that acquires the redirect surface.
///
/// `open_pending` must do its work synchronously; the orchestrator calls
/// it before any await so the popup attaches to the originating user
/// gesture.
pub trait RedirectSurface: Send + Sync {
    fn open_pending(&self) -> Box<dyn PopupHandle>;
}

/// Ephemeral keyed storage with take-clears semantics
pub trait HandshakeStore: Send + Sync {
    fn put(&self, key: &str, value: &str);
    /// Read and clear in one step; a second take returns `None`
    fn take(&self, key: &str) -> Option<String>;
}

/// Process-local [`HandshakeStore`], the default outside a browser shell
#[derive(Default)]
pub struct MemoryHandshakeStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryHandshakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandshakeStore for MemoryHandshakeStore {
    fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn take(&self, key: &str) -> Option<String> {
        self.entries.lock().remove(key)
    }
}

pub struct OAuthLinkOrchestrator {
    api: Arc<dyn IdentityApi>,
    surface: Arc<dyn RedirectSurface>,
    store: Arc<dyn HandshakeStore>,
    authn: Arc<AuthnOrchestrator>,
}

impl OAuthLinkOrchestrator {
    pub fn new(
        api: Arc<dyn IdentityApi>,
        surface: Arc<dyn RedirectSurface>,
        store: Arc<dyn HandshakeStore>,
        authn: Arc<AuthnOrchestrator>,
    ) -> Self {
        Self {
            api,
            surface,
            store,
            authn,
        }
    }

    /// Open the redirect surface and send it to the provider's
    /// authorization endpoint.
    ///
    /// On failure the surface is closed and the parked state cleared, so
    /// no stale handshake can complete later.
    pub async fn begin(
        &self,
        service: OAuthService,
        purpose: OAuthPurpose,
        redirect_uri: Option<&str>,
    ) -> FlowResult<()> {
        // Must happen before the first await.
        let mut popup = self.surface.open_pending();

        let state = generate_anti_forgery_state();
        self.store.put(OAUTH_STATE_STORAGE_KEY, &state);

        info!(service = service.as_str(), purpose = purpose.as_str(), "starting oauth handshake");
        match self
            .api
            .start_oauth(service, purpose, &state, redirect_uri)
            .await
        {
            Ok(endpoint) => {
                popup.navigate(&endpoint.endpoint_uri);
                Ok(())
            }
            Err(err) => {
                popup.close();
                self.store.take(OAUTH_STATE_STORAGE_KEY);
                warn!(error = %err, "oauth start failed");
                Err(classify::classify_oauth(&err))
            }
        }
    }

    /// Exchange the authorization code the provider redirected back with.
    ///
    /// The echoed state must match the parked value; the comparison is
    /// constant-time and the parked value is cleared either way, so a
    /// mismatched or replayed redirect can neither complete nor retry.
    /// The server's response resumes the authentication transaction: on
    /// SUCCESS the session is established, on AWAITING_SECOND_FACTOR the
    /// transaction continues through the usual second-factor operations.
    pub async fn complete(
        &self,
        purpose: OAuthPurpose,
        code: &str,
        echoed_state: &str,
    ) -> FlowResult<FlowState> {
        let expected = self
            .store
            .take(OAUTH_STATE_STORAGE_KEY)
            .ok_or(FlowError::StateMismatch)?;

        if !bool::from(expected.as_bytes().ct_eq(echoed_state.as_bytes())) {
            warn!("oauth state mismatch");
            return Err(FlowError::StateMismatch);
        }

        match self.api.complete_oauth(purpose, code, echoed_state).await {
            Ok(response) => self.authn.resume(response),
            Err(err) => Err(classify::classify_oauth(&err)),
        }
    }

    /// Abandon a handshake that has not returned; clears the parked state
    pub fn cancel(&self) {
        self.store.take(OAUTH_STATE_STORAGE_KEY);
    }
}
