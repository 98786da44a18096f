//! Error types for mailprobe.
//!
//! Uses `thiserror` for ergonomic error definitions. Probe errors never
//! escape the public probe functions: they are folded into
//! [`ProbeOutcome`](crate::outcome::ProbeOutcome) values at the boundary.

use crate::outcome::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Input rejected before any network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("host is required")]
    EmptyHost,

    #[error("hostname too long ({0} characters, max 253)")]
    HostTooLong(usize),

    #[error("hostname label '{0}' is too long (max 63 characters per label)")]
    LabelTooLong(String),

    #[error("empty hostname label")]
    EmptyLabel,

    #[error("invalid hostname format: {0}")]
    InvalidHost(String),

    #[error("port {0} is out of valid range (1-65535)")]
    PortOutOfRange(i64),

    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidPortRange(u16, u16),

    #[error("too many ports requested ({0}, max {1})")]
    TooManyPorts(usize, usize),

    #[error("invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("no ports requested")]
    NoPorts,

    #[error("port {0} listed more than once")]
    DuplicatePort(u16),

    #[error("invalid security type '{0}', must be one of: none, ssl, tls, starttls")]
    InvalidSecurity(String),

    #[error("invalid email address '{address}': {reason}")]
    InvalidEmail { address: String, reason: String },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{field} too long ({len} characters, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} must not contain line breaks")]
    LineBreak { field: &'static str },

    #[error("credentials are required for this probe")]
    MissingCredentials,

    #[error("{0} contains characters that cannot be sent to the server")]
    UnsendableCredential(&'static str),
}

/// Result type alias for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised while a probe is talking to a server.
///
/// Each variant maps onto exactly one [`FailureKind`] so callers get a
/// stable, machine-readable classification.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("DNS resolution failed for '{host}': {reason}")]
    Dns { host: String, reason: String },

    #[error("connection refused")]
    ConnectionRefused,

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("server rejected connection: {0}")]
    GreetingRejected(String),

    #[error("server does not advertise STARTTLS")]
    StartTlsUnavailable,

    #[error("STARTTLS rejected: {0}")]
    StartTlsRejected(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    #[error("server does not offer a usable login mechanism: {0}")]
    AuthUnavailable(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("{stage} rejected: {reply}")]
    SendRejected { stage: &'static str, reply: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ProbeError {
    /// The stable failure classification for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Dns { .. } => FailureKind::DnsFailure,
            Self::ConnectionRefused | Self::Unreachable(_) | Self::ConnectFailed(_) => {
                FailureKind::ConnectFailed
            }
            Self::Timeout(_) => FailureKind::Timeout,
            Self::ConnectionClosed | Self::Io(_) => FailureKind::ConnectionClosed,
            Self::GreetingRejected(_) => FailureKind::GreetingRejected,
            Self::StartTlsUnavailable => FailureKind::StartTlsUnavailable,
            Self::StartTlsRejected(_) => FailureKind::StartTlsFailed,
            Self::TlsHandshake(_) => FailureKind::TlsHandshakeFailed,
            Self::AuthUnavailable(_) => FailureKind::AuthUnavailable,
            Self::AuthFailed(_) => FailureKind::AuthFailed,
            Self::SendRejected { .. } => FailureKind::SendRejected,
            Self::Protocol(_) => FailureKind::ProtocolError,
            Self::Validation(_) => FailureKind::InvalidInput,
        }
    }
}

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by the command-line layer.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_kinds() {
        assert_eq!(ProbeError::ConnectionRefused.kind(), FailureKind::ConnectFailed);
        assert_eq!(ProbeError::Timeout(5).kind(), FailureKind::Timeout);
        assert_eq!(
            ProbeError::GreetingRejected("554 go away".into()).kind(),
            FailureKind::GreetingRejected
        );
        assert_eq!(
            ProbeError::AuthFailed("535".into()).kind(),
            FailureKind::AuthFailed
        );
        assert_eq!(
            ProbeError::Validation(ValidationError::EmptyHost).kind(),
            FailureKind::InvalidInput
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::PortOutOfRange(0).to_string(),
            "port 0 is out of valid range (1-65535)"
        );
        assert_eq!(
            ValidationError::TooLong {
                field: "subject",
                len: 201,
                max: 200
            }
            .to_string(),
            "subject too long (201 characters, max 200)"
        );
    }
}
