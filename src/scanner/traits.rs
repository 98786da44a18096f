//! Port prober abstraction.
//!
//! Defines the per-port result type and a common interface for probing a
//! single port, so the scan loop can be driven by the TCP implementation
//! or by a stand-in during testing.

use crate::types::Port;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOutcome {
    /// The port number that was probed.
    pub port: Port,
    /// Whether a TCP connection was accepted.
    pub open: bool,
    /// Well-known service name for the port, or "Unknown".
    pub service: String,
    /// Sanitized greeting text sent by the service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Time from connect start to success or definitive failure.
    pub response_ms: u64,
    /// Why the port is not open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortOutcome {
    /// Create a new port outcome.
    pub fn new(port: Port, open: bool, service: impl Into<String>) -> Self {
        Self {
            port,
            open,
            service: service.into(),
            banner: None,
            response_ms: 0,
            error: None,
        }
    }

    /// Set the banner.
    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }

    /// Set the response time.
    pub fn with_response_time(mut self, time_ms: u64) -> Self {
        self.response_ms = time_ms;
        self
    }

    /// Set the failure text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Trait for single-port probe implementations.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Probe one port. Never fails: problems are reported in the outcome.
    async fn probe(&self, port: Port) -> PortOutcome;

    /// Get the configured connect timeout.
    fn timeout(&self) -> Duration;
}
