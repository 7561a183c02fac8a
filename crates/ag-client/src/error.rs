//! Transport-level error type
//!
//! `ApiError` is deliberately dumb: it records what happened on the wire
//! (no connection, non-2xx status, unparseable body) and nothing more.
//! Mapping a status code onto the user-facing taxonomy is the
//! orchestrators' job, done once per operation in `ag-flows::classify`.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Request never produced an HTTP response (DNS, connect, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// Response body (or the server's `error` field when present);
        /// kept verbatim so classifiers can pattern-match on it
        message: String,
    },

    /// 2xx response whose body did not decode into the expected shape
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message for `Http` errors, empty otherwise
    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. } => message,
            _ => "",
        }
    }
}
