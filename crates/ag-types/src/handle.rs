//! Handle (contact/identifier) normalization
//!
//! A handle is whatever the user typed into the identifier field: an email
//! address, a phone number, or a username. Normalization trims it and
//! classifies it with light shape checks before submission; the server
//! performs the authoritative validation.

use serde::{Deserialize, Serialize};

use crate::errors::{FlowError, ValidationReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Email,
    Phone,
    Username,
}

/// A normalized user identifier, immutable once a transaction starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    value: String,
    kind: HandleKind,
}

impl Handle {
    /// Normalize and classify a raw identifier.
    ///
    /// Empty (or all-whitespace) input is rejected locally. A handle
    /// starting with `+` or consisting only of digits and separators is
    /// treated as a phone number; one containing `@` as an email; anything
    /// else as a username.
    pub fn parse(raw: &str) -> Result<Self, FlowError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(FlowError::Validation(ValidationReason::EmptyHandle));
        }

        let kind = if looks_like_phone(value) {
            if !is_plausible_phone(value) {
                return Err(FlowError::Validation(ValidationReason::InvalidPhone));
            }
            HandleKind::Phone
        } else if value.contains('@') {
            if !is_plausible_email(value) {
                return Err(FlowError::Validation(ValidationReason::InvalidEmail));
            }
            HandleKind::Email
        } else {
            HandleKind::Username
        };

        Ok(Self {
            value: value.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

fn looks_like_phone(value: &str) -> bool {
    value.starts_with('+')
        || (!value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')')))
}

// Loose E.164 shape: optional +, 4-15 digits, separators allowed.
fn is_plausible_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    valid_chars && (4..=15).contains(&digits)
}

// One @ with a non-empty local part and a dotted domain.
fn is_plausible_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_classification() {
        let handle = Handle::parse("user@example.com").unwrap();
        assert_eq!(handle.kind(), HandleKind::Email);
        assert_eq!(handle.as_str(), "user@example.com");
    }

    #[test]
    fn test_phone_classification() {
        let handle = Handle::parse("+85212345678").unwrap();
        assert_eq!(handle.kind(), HandleKind::Phone);

        let handle = Handle::parse("(852) 1234-5678").unwrap();
        assert_eq!(handle.kind(), HandleKind::Phone);
    }

    #[test]
    fn test_username_classification() {
        let handle = Handle::parse("alice").unwrap();
        assert_eq!(handle.kind(), HandleKind::Username);
    }

    #[test]
    fn test_trims_whitespace() {
        let handle = Handle::parse("  user@example.com  ").unwrap();
        assert_eq!(handle.as_str(), "user@example.com");
    }

    #[test]
    fn test_empty_handle_rejected() {
        assert_eq!(
            Handle::parse("   ").unwrap_err(),
            FlowError::Validation(ValidationReason::EmptyHandle)
        );
    }

    #[test]
    fn test_malformed_email_rejected() {
        assert_eq!(
            Handle::parse("user@").unwrap_err(),
            FlowError::Validation(ValidationReason::InvalidEmail)
        );
        assert_eq!(
            Handle::parse("@example.com").unwrap_err(),
            FlowError::Validation(ValidationReason::InvalidEmail)
        );
    }

    #[test]
    fn test_malformed_phone_rejected() {
        assert_eq!(
            Handle::parse("+12").unwrap_err(),
            FlowError::Validation(ValidationReason::InvalidPhone)
        );
    }
}
