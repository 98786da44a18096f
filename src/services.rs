//! Service detection based on well-known port numbers.
//!
//! Provides mapping from port numbers to likely service names, with the
//! mail ports taking precedence, plus mail-server identification from
//! greeting banners.

use crate::types::SecurityMode;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Protocol family of a mail port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProtocol {
    Smtp,
    Imap,
    Pop3,
}

/// One entry of the well-known email port table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailPort {
    pub port: u16,
    pub name: &'static str,
    pub protocol: MailProtocol,
    pub security: SecurityMode,
}

/// Ports probed by a "common" scan, in scan order.
pub const EMAIL_PORTS: [EmailPort; 7] = [
    EmailPort { port: 25, name: "SMTP", protocol: MailProtocol::Smtp, security: SecurityMode::None },
    EmailPort { port: 465, name: "SMTPS", protocol: MailProtocol::Smtp, security: SecurityMode::ImplicitTls },
    EmailPort { port: 587, name: "SMTP-Submission", protocol: MailProtocol::Smtp, security: SecurityMode::StartTls },
    EmailPort { port: 143, name: "IMAP", protocol: MailProtocol::Imap, security: SecurityMode::None },
    EmailPort { port: 993, name: "IMAPS", protocol: MailProtocol::Imap, security: SecurityMode::ImplicitTls },
    EmailPort { port: 110, name: "POP3", protocol: MailProtocol::Pop3, security: SecurityMode::None },
    EmailPort { port: 995, name: "POP3S", protocol: MailProtocol::Pop3, security: SecurityMode::ImplicitTls },
];

/// Static map of other well-known ports to service names.
static PORT_SERVICES: LazyLock<HashMap<u16, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert(20, "FTP-Data");
    m.insert(21, "FTP");
    m.insert(22, "SSH");
    m.insert(23, "Telnet");
    m.insert(53, "DNS");
    m.insert(80, "HTTP");
    m.insert(88, "Kerberos");
    m.insert(111, "RPCBind");
    m.insert(119, "NNTP");
    m.insert(123, "NTP");
    m.insert(135, "MSRPC");
    m.insert(139, "NetBIOS-SSN");
    m.insert(161, "SNMP");
    m.insert(389, "LDAP");
    m.insert(443, "HTTPS");
    m.insert(445, "Microsoft-DS");
    m.insert(636, "LDAPS");
    m.insert(2525, "SMTP (Alternative)");
    m.insert(3306, "MySQL");
    m.insert(3389, "RDP");
    m.insert(4190, "ManageSieve");
    m.insert(5432, "PostgreSQL");
    m.insert(6379, "Redis");
    m.insert(8080, "HTTP-Proxy");
    m.insert(8443, "HTTPS-Alt");
    m.insert(10000, "Webmin");

    m
});

/// Look up the email table entry for a port.
pub fn email_port(port: u16) -> Option<&'static EmailPort> {
    EMAIL_PORTS.iter().find(|e| e.port == port)
}

/// Look up the probable service name for a given port.
///
/// Returns `None` if the port is not in either table.
pub fn get_service_name(port: u16) -> Option<&'static str> {
    email_port(port)
        .map(|e| e.name)
        .or_else(|| PORT_SERVICES.get(&port).copied())
}

/// Get a descriptive string for the service on a port.
///
/// Returns "Unknown" if the port is not recognized.
pub fn get_service_description(port: u16) -> &'static str {
    get_service_name(port).unwrap_or("Unknown")
}

/// Mail server software identifiers, matched case-insensitively in order.
const SERVER_SIGNATURES: [(&[&str], &str); 8] = [
    (&["microsoft"], "Microsoft Exchange"),
    (&["postfix"], "Postfix"),
    (&["sendmail"], "Sendmail"),
    (&["exim"], "Exim"),
    (&["dovecot"], "Dovecot"),
    (&["courier"], "Courier"),
    (&["gmail"], "Gmail"),
    (&["outlook", "office365"], "Outlook/Office365"),
];

/// Guess the server software from a greeting banner.
pub fn identify_server(banner: &str) -> Option<&'static str> {
    let banner = banner.to_lowercase();
    SERVER_SIGNATURES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| banner.contains(n)))
        .map(|(_, name)| *name)
}
