//! IMAP probing: login and an INBOX summary.

pub mod client;
pub mod probe;
pub mod response;

pub use client::{Greeting, ImapClient};
pub use response::{Status, TaggedResponse};

use crate::outcome::ImapOutcome;
use crate::session::ProbeOptions;
use crate::types::ProbeTarget;

/// IMAP prober carrying the engine options.
#[derive(Debug, Clone, Default)]
pub struct ImapProbe {
    options: ProbeOptions,
}

impl ImapProbe {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    pub async fn probe(&self, target: &ProbeTarget) -> ImapOutcome {
        probe::probe(target, &self.options).await
    }
}
