//! Email server detection from scan results.
//!
//! Summarizes which mail protocols a host exposes, which transport
//! security those ports imply, and what software the banners suggest.

use crate::scanner::PortScanResult;
use crate::services::{email_port, identify_server, MailProtocol};
use crate::types::SecurityMode;
use serde::Serialize;

/// One open mail port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailEndpoint {
    pub port: u16,
    pub security: SecurityMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

/// What a scan reveals about a host's mail service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailServerProfile {
    pub smtp_ports: Vec<MailEndpoint>,
    pub imap_ports: Vec<MailEndpoint>,
    pub pop3_ports: Vec<MailEndpoint>,
    /// Distinct security modes offered, in discovery order.
    pub security_protocols: Vec<SecurityMode>,
    /// Server software guessed from banners.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_software: Option<String>,
    pub recommendations: Vec<String>,
}

impl EmailServerProfile {
    /// Whether any mail port is open.
    pub fn is_email_server(&self) -> bool {
        !(self.smtp_ports.is_empty() && self.imap_ports.is_empty() && self.pop3_ports.is_empty())
    }
}

/// Build a profile from the open well-known mail ports of a scan.
pub fn detect_email_server(result: &PortScanResult) -> EmailServerProfile {
    let mut profile = EmailServerProfile::default();

    for outcome in result.outcomes().filter(|o| o.open) {
        let Some(entry) = email_port(outcome.port.as_u16()) else {
            continue;
        };

        let endpoint = MailEndpoint {
            port: entry.port,
            security: entry.security,
            banner: outcome.banner.clone(),
        };
        match entry.protocol {
            MailProtocol::Smtp => profile.smtp_ports.push(endpoint),
            MailProtocol::Imap => profile.imap_ports.push(endpoint),
            MailProtocol::Pop3 => profile.pop3_ports.push(endpoint),
        }

        if !profile.security_protocols.contains(&entry.security) {
            profile.security_protocols.push(entry.security);
        }

        if let Some(software) = outcome.banner.as_deref().and_then(identify_server) {
            profile.server_software = Some(software.to_string());
        }
    }

    profile.recommendations = recommendations(&result.open_ports());
    profile
}

/// Hardening suggestions based on which secure alternatives are missing.
pub fn recommendations(open_ports: &[u16]) -> Vec<String> {
    let open = |p: u16| open_ports.contains(&p);
    let mut notes = Vec::new();

    if open(25) && !open(587) {
        notes.push("Consider using port 587 for SMTP submission instead of port 25".to_string());
    }
    if open(143) && !open(993) {
        notes.push("Consider enabling IMAPS (port 993) for secure IMAP connections".to_string());
    }
    if open(110) && !open(995) {
        notes.push("Consider enabling POP3S (port 995) for secure POP3 connections".to_string());
    }

    notes
}
