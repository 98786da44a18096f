//! Structured probe results.
//!
//! Every probe produces exactly one [`ProbeOutcome`], parameterised by a
//! detail type specific to the probe kind. Outcomes are plain values: the
//! caller decides how to serialize, log or persist them.

use crate::error::ProbeError;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Broad error category a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input, rejected before any network attempt.
    InputValidation,
    /// Refused, unreachable, DNS or timeout. Transient; callers may retry.
    Network,
    /// The server answered with an error status.
    Protocol,
    /// TLS handshake or STARTTLS upgrade failed.
    SecurityNegotiation,
    /// Credentials rejected or no usable login mechanism.
    Authentication,
}

/// Machine-readable reason a probe failed.
///
/// The string codes returned by [`FailureKind::as_str`] are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InvalidInput,
    DnsFailure,
    ConnectFailed,
    Timeout,
    ConnectionClosed,
    GreetingRejected,
    #[serde(rename = "starttls-unavailable")]
    StartTlsUnavailable,
    #[serde(rename = "starttls-failed")]
    StartTlsFailed,
    #[serde(rename = "tls-handshake-failed")]
    TlsHandshakeFailed,
    AuthUnavailable,
    AuthFailed,
    SendRejected,
    ProtocolError,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid-input",
            Self::DnsFailure => "dns-failure",
            Self::ConnectFailed => "connect-failed",
            Self::Timeout => "timeout",
            Self::ConnectionClosed => "connection-closed",
            Self::GreetingRejected => "greeting-rejected",
            Self::StartTlsUnavailable => "starttls-unavailable",
            Self::StartTlsFailed => "starttls-failed",
            Self::TlsHandshakeFailed => "tls-handshake-failed",
            Self::AuthUnavailable => "auth-unavailable",
            Self::AuthFailed => "auth-failed",
            Self::SendRejected => "send-rejected",
            Self::ProtocolError => "protocol-error",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidInput => ErrorCategory::InputValidation,
            Self::DnsFailure | Self::ConnectFailed | Self::Timeout | Self::ConnectionClosed => {
                ErrorCategory::Network
            }
            Self::GreetingRejected | Self::SendRejected | Self::ProtocolError => {
                ErrorCategory::Protocol
            }
            Self::StartTlsUnavailable | Self::StartTlsFailed | Self::TlsHandshakeFailed => {
                ErrorCategory::SecurityNegotiation
            }
            Self::AuthUnavailable | Self::AuthFailed => ErrorCategory::Authentication,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a probe failed: a stable kind plus the human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub category: ErrorCategory,
    pub reason: String,
}

impl From<&ProbeError> for Failure {
    fn from(err: &ProbeError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            category: kind.category(),
            reason: err.to_string(),
        }
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome<D> {
    /// Whether the probe reached its goal.
    pub succeeded: bool,
    /// One-line summary suitable for display.
    pub message: String,
    /// Wall-clock duration of the attempt.
    pub elapsed_ms: u64,
    /// Present exactly when `succeeded` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Probe-specific information gathered before success or failure.
    pub details: D,
}

impl<D> ProbeOutcome<D> {
    pub(crate) fn success(started: Instant, message: impl Into<String>, details: D) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            elapsed_ms: elapsed_ms(started),
            failure: None,
            details,
        }
    }

    pub(crate) fn failed(started: Instant, prefix: &str, err: &ProbeError, details: D) -> Self {
        Self {
            succeeded: false,
            message: format!("{prefix}: {err}"),
            elapsed_ms: elapsed_ms(started),
            failure: Some(Failure::from(err)),
            details,
        }
    }

    /// Stable failure code, e.g. `"auth-failed"`.
    pub fn failure_code(&self) -> Option<&'static str> {
        self.failure.as_ref().map(|f| f.kind.as_str())
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// Information collected by an SMTP handshake probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SmtpDetails {
    /// Text of the server's greeting line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    /// Advertised EHLO extension lines, keyword first, truncated for display.
    pub capabilities: Vec<String>,
    /// SASL mechanisms listed in the AUTH extension.
    pub auth_mechanisms: Vec<String>,
    /// Maximum message size from the SIZE extension, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<u64>,
    pub tls_active: bool,
    pub authenticated: bool,
    /// The conversation as seen on the wire, credentials redacted and
    /// message content elided.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<String>,
}

/// Storage quota reported by an IMAP server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quota {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub usage_percent: f64,
}

impl Quota {
    /// Build from the kilobyte values used by the IMAP QUOTA extension.
    pub fn from_kilobytes(used_kb: u64, limit_kb: u64) -> Self {
        let usage_percent = if limit_kb > 0 {
            ((used_kb as f64 / limit_kb as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            used_bytes: used_kb.saturating_mul(1024),
            limit_bytes: limit_kb.saturating_mul(1024),
            usage_percent,
        }
    }
}

/// Information collected by an IMAP login probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImapDetails {
    pub total_messages: u32,
    pub recent_messages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_messages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<Quota>,
    pub capabilities: Vec<String>,
    pub tls_active: bool,
    /// Summary line such as `IMAP Server Connected | Messages: 3 | ...`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<String>,
}

/// Information about a test message submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendDetails {
    /// Message-ID header placed on the test message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Queue identifier from the server's final reply, when it supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    /// Final reply to the DATA transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_reply: Option<String>,
    /// Handshake information gathered on the way.
    pub smtp: SmtpDetails,
}

pub type SmtpOutcome = ProbeOutcome<SmtpDetails>;
pub type ImapOutcome = ProbeOutcome<ImapDetails>;
pub type SendOutcome = ProbeOutcome<SendDetails>;

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_codes_are_stable() {
        assert_eq!(FailureKind::GreetingRejected.as_str(), "greeting-rejected");
        assert_eq!(FailureKind::AuthFailed.as_str(), "auth-failed");
        assert_eq!(FailureKind::StartTlsUnavailable.as_str(), "starttls-unavailable");
        assert_eq!(FailureKind::TlsHandshakeFailed.to_string(), "tls-handshake-failed");
    }

    #[test]
    fn test_serde_matches_codes() {
        for kind in [
            FailureKind::InvalidInput,
            FailureKind::DnsFailure,
            FailureKind::StartTlsFailed,
            FailureKind::TlsHandshakeFailed,
            FailureKind::SendRejected,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(FailureKind::Timeout.category(), ErrorCategory::Network);
        assert_eq!(
            FailureKind::StartTlsFailed.category(),
            ErrorCategory::SecurityNegotiation
        );
        assert_eq!(FailureKind::AuthFailed.category(), ErrorCategory::Authentication);
        assert_eq!(FailureKind::SendRejected.category(), ErrorCategory::Protocol);
    }

    #[test]
    fn test_failed_outcome() {
        let started = Instant::now();
        let err = ProbeError::AuthFailed("535 5.7.8 bad credentials".into());
        let outcome = ProbeOutcome::failed(started, "SMTP Error", &err, SmtpDetails::default());
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure_code(), Some("auth-failed"));
        assert!(outcome.message.starts_with("SMTP Error: authentication failed"));
    }

    #[test]
    fn test_quota_from_kilobytes() {
        let quota = Quota::from_kilobytes(512, 2048);
        assert_eq!(quota.used_bytes, 512 * 1024);
        assert_eq!(quota.limit_bytes, 2048 * 1024);
        assert!((quota.usage_percent - 25.0).abs() < f64::EPSILON);

        assert_eq!(Quota::from_kilobytes(10, 0).usage_percent, 0.0);
    }
}
