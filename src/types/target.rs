//! Probe target specification.
//!
//! A [`ProbeTarget`] bundles everything a protocol probe needs to reach a
//! server: host, port, security mode, timeout and optional credentials.
//! It can only be built through validation.

use crate::error::{ValidationError, ValidationResult};
use crate::types::Port;
use crate::validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Transport security requested for a protocol probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Plaintext for the whole session.
    #[default]
    None,
    /// TLS handshake immediately after TCP connect (SMTPS, IMAPS).
    ImplicitTls,
    /// Plaintext first, then upgrade in-band with STARTTLS.
    StartTls,
}

impl SecurityMode {
    /// Field value accepted for each mode, as used by form input.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ImplicitTls => "ssl",
            Self::StartTls => "starttls",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ImplicitTls => write!(f, "implicit TLS"),
            Self::StartTls => write!(f, "STARTTLS"),
        }
    }
}

impl FromStr for SecurityMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ssl" => Ok(Self::ImplicitTls),
            "tls" | "starttls" => Ok(Self::StartTls),
            _ => Err(ValidationError::InvalidSecurity(s.to_string())),
        }
    }
}

/// Login credentials. The secret never appears in `Debug` output or
/// serialized results.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where and how to run a protocol probe.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    host: String,
    port: Port,
    security: SecurityMode,
    timeout: Duration,
    credentials: Option<Credentials>,
}

impl ProbeTarget {
    /// Lower bound applied to probe timeouts.
    pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);
    /// Upper bound applied to probe timeouts.
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(120);
    /// Default probe timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a target after validating the host. Timeout defaults to 30s.
    pub fn new(host: impl Into<String>, port: Port, security: SecurityMode) -> ValidationResult<Self> {
        let host = host.into().trim().to_string();
        validate::validate_host(&host)?;
        Ok(Self {
            host,
            port,
            security,
            timeout: Self::DEFAULT_TIMEOUT,
            credentials: None,
        })
    }

    /// Build a target from loosely typed form fields.
    ///
    /// Empty usernames mean "no credentials".
    pub fn from_fields(
        host: &str,
        port: i64,
        security: &str,
        timeout_secs: u64,
        username: &str,
        password: &str,
    ) -> ValidationResult<Self> {
        let port = validate::validate_port(port)?;
        let security = validate::validate_security(security)?;
        let target = Self::new(host, port, security)?.with_timeout(Duration::from_secs(timeout_secs));
        if username.trim().is_empty() {
            Ok(target)
        } else {
            Ok(target.with_credentials(Credentials::new(username.trim(), password)))
        }
    }

    /// Set the overall deadline, clamped to 5-120 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(Self::MIN_TIMEOUT, Self::MAX_TIMEOUT);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Credentials, or an error for probes that cannot run without them.
    pub fn require_credentials(&self) -> ValidationResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or(ValidationError::MissingCredentials)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{} ({})", self.host, self.port, self.security)
        } else {
            write!(f, "{}:{} ({})", self.host, self.port, self.security)
        }
    }
}
