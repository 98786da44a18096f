//! SMTP probing: handshake, capability discovery, authentication and
//! test message submission.

pub mod auth;
pub mod client;
pub mod probe;
pub mod reply;
pub mod send;

pub use client::{Capabilities, SmtpClient};
pub use reply::Reply;
pub use send::{compose_message, ComposedMessage, EmailSendRequest};

use crate::outcome::{SendOutcome, SmtpOutcome};
use crate::session::ProbeOptions;
use crate::types::ProbeTarget;

/// SMTP prober carrying the engine options.
#[derive(Debug, Clone, Default)]
pub struct SmtpProbe {
    options: ProbeOptions,
}

impl SmtpProbe {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Handshake with the target; authenticates when it carries credentials.
    pub async fn probe(&self, target: &ProbeTarget) -> SmtpOutcome {
        probe::probe(target, &self.options).await
    }

    /// Submit one test message.
    pub async fn send_test_email(&self, request: &EmailSendRequest) -> SendOutcome {
        send::send_test_email(request, &self.options).await
    }
}
