//! Identity API collaborator for AuthGate
//!
//! The orchestrators in `ag-flows` drive an abstract [`IdentityApi`]; the
//! concrete [`HttpIdentityApi`] speaks JSON over HTTP to the identity
//! server. Everything the server returns is transaction-shaped: a status,
//! an opaque continuation token, and optionally a challenge list or a
//! terminal token.

pub mod api;
pub mod dto;
pub mod error;
pub mod http;

pub use api::{IdentityApi, ResetProof};
pub use dto::{AuthnResponse, OAuthEndpoint, RedirectParams, ResetResponse, SignUpRequest};
pub use error::ApiError;
pub use http::{sign_up_request, HttpIdentityApi};
