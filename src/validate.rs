//! Syntactic input validation.
//!
//! All checks are pure: no DNS lookups, no network access. Each returns
//! `Ok(())` or a [`ValidationError`] whose message explains the rejection.

use crate::error::{ValidationError, ValidationResult};
use crate::types::{Port, SecurityMode};
use std::net::IpAddr;

/// Maximum total hostname length.
pub const MAX_HOST_LEN: usize = 253;
/// Maximum length of a single hostname label.
pub const MAX_LABEL_LEN: usize = 63;
/// Maximum length of an email address.
pub const MAX_EMAIL_LEN: usize = 254;
/// Maximum length of the local part of an email address.
pub const MAX_LOCAL_PART_LEN: usize = 64;
/// Maximum subject length for test messages.
pub const MAX_SUBJECT_LEN: usize = 200;
/// Maximum body length for test messages.
pub const MAX_BODY_LEN: usize = 10_000;

/// Accept an IP literal or a syntactically valid DNS hostname.
pub fn validate_host(host: &str) -> ValidationResult<()> {
    if host.is_empty() {
        return Err(ValidationError::EmptyHost);
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if host.len() > MAX_HOST_LEN {
        return Err(ValidationError::HostTooLong(host.len()));
    }

    for label in host.split('.') {
        validate_label(label)?;
    }

    Ok(())
}

fn validate_label(label: &str) -> ValidationResult<()> {
    if label.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(ValidationError::LabelTooLong(label.to_string()));
    }
    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(ValidationError::InvalidHost(format!(
            "label '{label}' contains characters other than letters, digits and hyphens"
        )));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::InvalidHost(format!(
            "label '{label}' starts or ends with a hyphen"
        )));
    }
    Ok(())
}

pub fn is_valid_host(host: &str) -> bool {
    validate_host(host).is_ok()
}

/// Accept 1 through 65535.
pub fn validate_port(port: i64) -> ValidationResult<Port> {
    Port::from_number(port)
}

pub fn is_valid_port(port: i64) -> bool {
    validate_port(port).is_ok()
}

/// Parse a security type field (`none`, `ssl`, `tls`, `starttls`).
pub fn validate_security(security: &str) -> ValidationResult<SecurityMode> {
    security.parse()
}

/// Validate an email address: local part, domain part and overall length.
pub fn validate_email_address(address: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidEmail {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    if address.len() > MAX_EMAIL_LEN {
        return Err(invalid("address too long (max 254 characters)"));
    }

    let (local, domain) = match address.split_once('@') {
        Some((local, domain)) if !domain.contains('@') => (local, domain),
        _ => return Err(invalid("must contain exactly one @ symbol")),
    };

    if local.is_empty() {
        return Err(invalid("local part cannot be empty"));
    }
    if local.len() > MAX_LOCAL_PART_LEN {
        return Err(invalid("local part too long (max 64 characters)"));
    }
    if !local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-'))
    {
        return Err(invalid("local part contains invalid characters"));
    }
    if local.starts_with('.') || local.ends_with('.') {
        return Err(invalid("local part cannot start or end with a dot"));
    }
    if local.contains("..") {
        return Err(invalid("local part cannot contain consecutive dots"));
    }

    if domain.is_empty() {
        return Err(invalid("domain part cannot be empty"));
    }
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        return literal
            .parse::<IpAddr>()
            .map(|_| ())
            .map_err(|_| invalid("invalid IP address in domain part"));
    }
    validate_host(domain).map_err(|e| invalid(&e.to_string()))
}

pub fn is_valid_email_address(address: &str) -> bool {
    validate_email_address(address).is_ok()
}

/// Subject must be present, short, and free of header-breaking characters.
pub fn validate_subject(subject: &str) -> ValidationResult<()> {
    validate_text("subject", subject, MAX_SUBJECT_LEN)?;
    if subject.contains(['\r', '\n']) {
        return Err(ValidationError::LineBreak { field: "subject" });
    }
    Ok(())
}

pub fn validate_body(body: &str) -> ValidationResult<()> {
    validate_text("body", body, MAX_BODY_LEN)
}

fn validate_text(field: &'static str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}

/// Non-fatal warnings about unusual SMTP port/security combinations.
pub fn smtp_port_advisories(port: Port, security: SecurityMode) -> Vec<&'static str> {
    let mut notes = Vec::new();
    match (port.as_u16(), security) {
        (465, SecurityMode::None | SecurityMode::StartTls) => {
            notes.push("Port 465 typically requires SSL security");
        }
        (587, SecurityMode::None) => {
            notes.push("Port 587 typically requires TLS or STARTTLS security");
        }
        _ => {}
    }
    notes
}

/// Non-fatal warnings about unusual IMAP port/security combinations.
pub fn imap_port_advisories(port: Port, security: SecurityMode) -> Vec<&'static str> {
    let mut notes = Vec::new();
    match (port.as_u16(), security) {
        (993, SecurityMode::None | SecurityMode::StartTls) => {
            notes.push("Port 993 typically requires SSL security");
        }
        (143, SecurityMode::ImplicitTls) => {
            notes.push("Port 143 typically does not use SSL (use 993 for SSL)");
        }
        _ => {}
    }
    notes
}
