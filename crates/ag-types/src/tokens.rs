//! Opaque token newtypes
//!
//! Every value the identity server mints for a transaction is opaque: the
//! client must round-trip it verbatim and never decode it. The newtypes
//! below keep the different token kinds from being mixed up at call sites,
//! and redact themselves in Debug output so they cannot leak into logs.

use serde::{Deserialize, Serialize};

macro_rules! opaque_token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The raw wire value, for echoing back to the server
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "(redacted)"))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_token!(
    /// Server-issued transaction continuation token.
    ///
    /// The only authority for server-side progress: supplied unchanged on
    /// every subsequent call, invalid after terminal success/failure or
    /// expiry.
    ContinuationToken
);

opaque_token!(
    /// Access token issued on successful authentication
    AccessToken
);

opaque_token!(
    /// Single-use capability to set a new password, issued by the
    /// password-reset flow once a factor has been satisfied
    AuthorizationToken
);

opaque_token!(
    /// Out-of-band contact verification token (e.g. from a reset link)
    ContactToken
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = ContinuationToken::new("secret-state-token");
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let token = AccessToken::new("tok");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"tok\"");
        let back: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
