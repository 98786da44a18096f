//! Test message submission.
//!
//! Builds a small RFC 5322 message and submits it through an
//! authenticated SMTP session.

use crate::error::{ProbeError, ValidationResult};
use crate::outcome::{ProbeOutcome, SendDetails, SendOutcome};
use crate::session::{within_deadline, ProbeOptions, Transcript};
use crate::smtp::probe::handshake;
use crate::types::ProbeTarget;
use crate::validate;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Display name placed on the From header.
pub const SENDER_NAME: &str = "Mail Probe";

/// Longest line sent unencoded.
const MAX_RAW_LINE: usize = 998;

/// A validated request to send one test message.
#[derive(Debug, Clone)]
pub struct EmailSendRequest {
    target: ProbeTarget,
    from: String,
    to: String,
    subject: String,
    body: String,
    html: bool,
}

impl EmailSendRequest {
    /// Validate everything up front; nothing is sent for a bad request.
    pub fn new(
        target: ProbeTarget,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        html: bool,
    ) -> ValidationResult<Self> {
        let from = from.into().trim().to_string();
        let to = to.into().trim().to_string();
        let subject = subject.into();
        let body = body.into();

        target.require_credentials()?;
        validate::validate_email_address(&from)?;
        validate::validate_email_address(&to)?;
        validate::validate_subject(&subject)?;
        validate::validate_body(&body)?;

        Ok(Self {
            target,
            from,
            to,
            subject,
            body,
            html,
        })
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_html(&self) -> bool {
        self.html
    }
}

/// A rendered message ready for DATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub message_id: String,
    pub content: String,
}

/// Render the request with the current time and a fresh identifier.
pub fn compose_message(request: &EmailSendRequest) -> ComposedMessage {
    compose_at(request, Local::now(), Uuid::new_v4())
}

fn compose_at<Tz: chrono::TimeZone>(
    request: &EmailSendRequest,
    date: DateTime<Tz>,
    id: Uuid,
) -> ComposedMessage
where
    Tz::Offset: std::fmt::Display,
{
    let domain = request
        .from
        .rsplit_once('@')
        .map(|(_, d)| d)
        .unwrap_or("localhost");
    let message_id = format!("<{id}@{domain}>");

    let mut out = String::with_capacity(request.body.len() * 2 + 512);
    header(&mut out, "Date", &date.to_rfc2822());
    header(&mut out, "From", &format!("\"{SENDER_NAME}\" <{}>", request.from));
    header(&mut out, "To", &format!("<{}>", request.to));
    header(&mut out, "Subject", &encode_header_value(&request.subject));
    header(&mut out, "Message-ID", &message_id);
    header(&mut out, "MIME-Version", "1.0");
    header(&mut out, "X-Mailer", concat!("mailprobe/", env!("CARGO_PKG_VERSION")));

    if request.html {
        let boundary = format!("=_mailprobe_{}", id.simple());
        header(
            &mut out,
            "Content-Type",
            &format!("multipart/alternative; boundary=\"{boundary}\""),
        );
        out.push_str("\r\n");
        out.push_str("This is a multi-part message in MIME format.\r\n");

        out.push_str(&format!("\r\n--{boundary}\r\n"));
        text_part(&mut out, "text/plain", &html_to_text(&request.body));
        out.push_str(&format!("\r\n--{boundary}\r\n"));
        text_part(&mut out, "text/html", &request.body);
        out.push_str(&format!("\r\n--{boundary}--\r\n"));
    } else {
        text_part(&mut out, "text/plain", &request.body);
    }

    ComposedMessage {
        message_id,
        content: out,
    }
}

fn header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Content headers, blank line and body for one text part.
fn text_part(out: &mut String, mime: &str, body: &str) {
    header(out, "Content-Type", &format!("{mime}; charset=UTF-8"));
    let body = body.replace("\r\n", "\n");
    let sendable_raw = body.is_ascii() && body.lines().all(|l| l.len() <= MAX_RAW_LINE);
    if sendable_raw {
        header(out, "Content-Transfer-Encoding", "7bit");
        out.push_str("\r\n");
        for line in body.lines() {
            out.push_str(line);
            out.push_str("\r\n");
        }
    } else {
        header(out, "Content-Transfer-Encoding", "base64");
        out.push_str("\r\n");
        let encoded = STANDARD.encode(body.as_bytes());
        for chunk in encoded.as_bytes().chunks(76) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push_str("\r\n");
        }
    }
}

/// RFC 2047 encode a header value if it contains non-ASCII characters.
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
}

/// Plain-text rendition of an HTML body: tags dropped, common entities
/// decoded, block-level breaks kept as newlines.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(name.as_str(), "br" | "p" | "div" | "li" | "tr" | "h1" | "h2" | "h3")
                    && !text.ends_with('\n')
                {
                    text.push('\n');
                }
            }
            _ if in_tag => tag.push(c),
            _ => text.push(c),
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Queue identifier from a final reply such as `250 2.0.0 Ok: queued as 4F2C1`.
pub fn parse_queue_id(reply_text: &str) -> Option<String> {
    let lower = reply_text.to_ascii_lowercase();
    let idx = lower.find("queued as")?;
    reply_text[idx + "queued as".len()..]
        .split_whitespace()
        .next()
        .map(|id| id.trim_matches(|c: char| !c.is_ascii_alphanumeric()).to_string())
        .filter(|id| !id.is_empty())
}

/// Send one test message.
pub async fn send_test_email(request: &EmailSendRequest, options: &ProbeOptions) -> SendOutcome {
    let started = Instant::now();
    let target = request.target();
    for note in validate::smtp_port_advisories(target.port(), target.security()) {
        warn!(target = %target, "{note}");
    }
    info!(target = %target, to = request.to(), "sending test message");

    let composed = compose_message(request);
    let mut details = SendDetails {
        message_id: Some(composed.message_id.clone()),
        ..SendDetails::default()
    };

    let transcript = Transcript::new();
    let result = within_deadline(target, async {
        let creds = target.require_credentials()?;
        let mut client =
            handshake(target, options, &mut details.smtp, Some(creds), &transcript).await?;
        let reply = client
            .send_mail(request.from(), request.to(), &composed.content)
            .await?;
        details.queue_id = parse_queue_id(&reply.text());
        details.accepted_reply = Some(reply.to_string());
        client.quit().await;
        Ok::<(), ProbeError>(())
    })
    .await;
    details.smtp.transcript = transcript.lines();

    match result {
        Ok(()) => {
            info!(target = %target, queue_id = ?details.queue_id, "test message accepted");
            ProbeOutcome::success(started, "Test email sent successfully", details)
        }
        Err(e) => {
            warn!(target = %target, code = e.kind().as_str(), error = %e, "test message failed");
            ProbeOutcome::failed(started, "Send error", &e, details)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::{Credentials, Port, SecurityMode};
    use chrono::TimeZone;

    fn target() -> ProbeTarget {
        ProbeTarget::new("smtp.example.com", Port::new(587).unwrap(), SecurityMode::StartTls)
            .unwrap()
            .with_credentials(Credentials::new("user@example.com", "pw"))
    }

    fn request(subject: &str, body: &str, html: bool) -> EmailSendRequest {
        EmailSendRequest::new(
            target(),
            "sender@example.com",
            "rcpt@example.org",
            subject,
            body,
            html,
        )
        .unwrap()
    }

    fn fixed(req: &EmailSendRequest) -> ComposedMessage {
        let date = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        compose_at(req, date, Uuid::nil())
    }

    #[test]
    fn test_request_validation() {
        let long_subject = "s".repeat(201);
        let err = EmailSendRequest::new(target(), "a@example.com", "b@example.com", long_subject, "x", false)
            .unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { field: "subject", .. }));

        let anon = ProbeTarget::new("smtp.example.com", Port::new(25).unwrap(), SecurityMode::None).unwrap();
        assert_eq!(
            EmailSendRequest::new(anon, "a@example.com", "b@example.com", "s", "x", false).unwrap_err(),
            ValidationError::MissingCredentials
        );

        assert!(EmailSendRequest::new(target(), "not-an-address", "b@example.com", "s", "x", false).is_err());
        assert!(EmailSendRequest::new(target(), "a@example.com", "b@example.com", "s", "", false).is_err());
    }

    #[test]
    fn test_plain_message() {
        let msg = fixed(&request("Hello", "line one\n.line two", false));
        assert_eq!(
            msg.message_id,
            "<00000000-0000-0000-0000-000000000000@example.com>"
        );
        assert!(msg.content.starts_with("Date: Fri, "));
        assert!(msg.content.contains("Mar 2024 12:00:00 +0000\r\n"));
        assert!(msg.content.contains("From: \"Mail Probe\" <sender@example.com>\r\n"));
        assert!(msg.content.contains("Subject: Hello\r\n"));
        assert!(msg.content.contains("Content-Transfer-Encoding: 7bit\r\n\r\nline one\r\n.line two\r\n"));
    }

    #[test]
    fn test_non_ascii_subject_and_body() {
        let msg = fixed(&request("Grüße", "Größe", false));
        assert!(msg.content.contains("Subject: =?UTF-8?B?R3LDvMOfZQ==?=\r\n"));
        assert!(msg.content.contains("Content-Transfer-Encoding: base64\r\n"));
    }

    #[test]
    fn test_html_message_is_multipart() {
        let msg = fixed(&request("Hi", "<p>Hello &amp; welcome</p><p>Bye</p>", true));
        assert!(msg.content.contains("multipart/alternative"));
        assert!(msg.content.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(msg.content.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(msg.content.contains("Hello & welcome\r\nBye\r\n"));
        assert!(msg.content.ends_with("--\r\n"));
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<b>bold</b> text"), "bold text");
        assert_eq!(html_to_text("a<br>b<br/>c"), "a\nb\nc");
        assert_eq!(html_to_text("&lt;tag&gt; &quot;q&quot;"), "<tag> \"q\"");
    }

    #[test]
    fn test_parse_queue_id() {
        assert_eq!(
            parse_queue_id("2.0.0 Ok: queued as 4F2C11A0B3"),
            Some("4F2C11A0B3".to_string())
        );
        assert_eq!(parse_queue_id("OK Queued as <abc123>"), Some("abc123".to_string()));
        assert_eq!(parse_queue_id("2.0.0 OK 1699999999 gsmtp"), None);
    }
}
