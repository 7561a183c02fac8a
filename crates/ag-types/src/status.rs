//! Transaction status and second-factor challenge vocabulary
//!
//! The identity server reports progress as a status string on every
//! response. The client adopts exactly what the server returns; a status or
//! challenge string outside the known vocabulary is a protocol error, never
//! a silent no-op.

use serde::{Deserialize, Serialize};

use crate::errors::FlowError;

/// Server-reported status of an authentication transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Waiting for the primary factor (password)
    AwaitingPrimary,
    /// Primary factor accepted, a second factor is required
    AwaitingSecondFactor,
    /// Terminal: authenticated, an access token was issued
    Success,
    /// Terminal: the transaction cannot continue
    Failed,
}

impl TransactionStatus {
    /// Parse a wire status string.
    ///
    /// Accepts the legacy short names (`PRIMARY`, `MFA_REQUIRED`) the
    /// original protocol emits alongside the canonical ones.
    pub fn parse(s: &str) -> Result<Self, FlowError> {
        match s {
            "AWAITING_PRIMARY" | "PRIMARY" => Ok(Self::AwaitingPrimary),
            "AWAITING_SECOND_FACTOR" | "MFA_REQUIRED" => Ok(Self::AwaitingSecondFactor),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(FlowError::Protocol(format!("unexpected status {other}"))),
        }
    }

    /// Whether this status ends the transaction (terminal states are sinks)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A second-factor verification method offered by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeMethod {
    SmsOtp,
    Totp,
    BackupCode,
}

impl ChallengeMethod {
    /// Parse a wire challenge identifier
    pub fn parse(s: &str) -> Result<Self, FlowError> {
        match s {
            "sms_otp" => Ok(Self::SmsOtp),
            "totp" => Ok(Self::Totp),
            "backup_code" => Ok(Self::BackupCode),
            other => Err(FlowError::Protocol(format!("unknown challenge {other}"))),
        }
    }

    /// Wire identifier for this method
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmsOtp => "sms_otp",
            Self::Totp => "totp",
            Self::BackupCode => "backup_code",
        }
    }
}

impl std::fmt::Display for ChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
