//! Minimal SMTP client used by the probes.
//!
//! Only the commands needed to assess a server are implemented: greeting,
//! EHLO/HELO, STARTTLS, AUTH, the mail transaction and QUIT.

use crate::error::{ProbeError, ProbeResult};
use crate::session::{Connection, TlsOptions};
use crate::smtp::reply::{read_reply, Reply};
use tracing::debug;

/// Extensions advertised in an EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    lines: Vec<String>,
}

impl Capabilities {
    /// Build from EHLO reply lines; the first line is the server's
    /// self-identification and is skipped.
    pub fn from_ehlo(reply: &Reply) -> Self {
        Self {
            lines: reply
                .lines
                .iter()
                .skip(1)
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn find(&self, keyword: &str) -> Option<&str> {
        self.lines.iter().map(String::as_str).find(|line| {
            line.split([' ', '='])
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
        })
    }

    /// Whether an extension keyword is advertised.
    pub fn has(&self, keyword: &str) -> bool {
        self.find(keyword).is_some()
    }

    /// SASL mechanisms from `AUTH` (or the legacy `AUTH=` form), uppercased.
    pub fn auth_mechanisms(&self) -> Vec<String> {
        let mut mechanisms: Vec<String> = Vec::new();
        for line in &self.lines {
            let Some((keyword, rest)) = line.split_once([' ', '=']) else {
                continue;
            };
            if !keyword.eq_ignore_ascii_case("AUTH") {
                continue;
            }
            for mech in rest.split_whitespace() {
                let mech = mech.to_ascii_uppercase();
                if !mechanisms.contains(&mech) {
                    mechanisms.push(mech);
                }
            }
        }
        mechanisms
    }

    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth_mechanisms()
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mechanism))
    }

    /// Declared maximum message size from `SIZE n`, if any.
    pub fn max_message_size(&self) -> Option<u64> {
        self.find("SIZE")?
            .split_whitespace()
            .nth(1)
            .and_then(|n| n.parse().ok())
            .filter(|&n| n > 0)
    }
}

/// An SMTP conversation over a [`Connection`].
pub struct SmtpClient {
    conn: Connection,
    client_identifier: String,
}

impl SmtpClient {
    pub fn new(conn: Connection, client_identifier: impl Into<String>) -> Self {
        Self {
            conn,
            client_identifier: client_identifier.into(),
        }
    }

    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }

    /// Send a command and read the reply.
    pub async fn command(&mut self, cmd: &str) -> ProbeResult<Reply> {
        self.conn.write_line(cmd).await?;
        read_reply(&mut self.conn).await
    }

    /// Send a command carrying credentials, logging `shown` instead.
    pub async fn secret_command(&mut self, cmd: &str, shown: &str) -> ProbeResult<Reply> {
        self.conn.write_secret(cmd, shown).await?;
        read_reply(&mut self.conn).await
    }

    /// Read the server greeting; anything but 2xx ends the session.
    pub async fn greeting(&mut self) -> ProbeResult<Reply> {
        let reply = read_reply(&mut self.conn).await?;
        if !reply.is_positive() {
            return Err(ProbeError::GreetingRejected(reply.to_string()));
        }
        Ok(reply)
    }

    /// Announce ourselves with EHLO, falling back to HELO.
    ///
    /// A HELO session has no extensions, so the returned capabilities are
    /// empty in that case.
    pub async fn hello(&mut self) -> ProbeResult<Capabilities> {
        let ehlo = self
            .command(&format!("EHLO {}", self.client_identifier))
            .await?;
        if ehlo.is_positive() {
            return Ok(Capabilities::from_ehlo(&ehlo));
        }

        debug!(reply = %ehlo, "EHLO rejected, trying HELO");
        let helo = self
            .command(&format!("HELO {}", self.client_identifier))
            .await?;
        if helo.is_positive() {
            Ok(Capabilities::default())
        } else {
            Err(ProbeError::Protocol(format!(
                "EHLO and HELO both rejected: {helo}"
            )))
        }
    }

    /// Issue STARTTLS and perform the handshake on the same socket.
    pub async fn starttls(mut self, tls: TlsOptions) -> ProbeResult<Self> {
        let reply = self.command("STARTTLS").await?;
        if reply.code != 220 {
            return Err(ProbeError::StartTlsRejected(reply.to_string()));
        }
        let conn = self.conn.upgrade(tls).await?;
        Ok(Self { conn, ..self })
    }

    /// Send the message envelope and content.
    ///
    /// `message` must already use CRLF line endings; dot-stuffing and the
    /// terminating `.` line are applied here.
    pub async fn send_mail(&mut self, from: &str, to: &str, message: &str) -> ProbeResult<Reply> {
        let reply = self.command(&format!("MAIL FROM:<{from}>")).await?;
        if !reply.is_positive() {
            return Err(ProbeError::SendRejected {
                stage: "MAIL FROM",
                reply: reply.to_string(),
            });
        }

        let reply = self.command(&format!("RCPT TO:<{to}>")).await?;
        if !reply.is_positive() {
            return Err(ProbeError::SendRejected {
                stage: "RCPT TO",
                reply: reply.to_string(),
            });
        }

        let reply = self.command("DATA").await?;
        if reply.code != 354 {
            return Err(ProbeError::SendRejected {
                stage: "DATA",
                reply: reply.to_string(),
            });
        }

        let mut payload = dot_stuff(message);
        payload.push_str(".\r\n");
        debug!(bytes = payload.len(), "sending message content");
        self.conn.write_raw(payload.as_bytes()).await?;

        let reply = read_reply(&mut self.conn).await?;
        if !reply.is_positive() {
            return Err(ProbeError::SendRejected {
                stage: "message content",
                reply: reply.to_string(),
            });
        }
        Ok(reply)
    }

    /// Say goodbye and close. Errors are ignored.
    pub async fn quit(mut self) {
        let _ = self.command("QUIT").await;
        self.conn.shutdown().await;
    }
}

/// Normalize line endings to CRLF and double leading dots.
pub fn dot_stuff(body: &str) -> String {
    let mut result = String::with_capacity(body.len() + 64);
    let body = body.strip_suffix('\n').unwrap_or(body);
    for line in body.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.starts_with('.') {
            result.push('.');
        }
        result.push_str(line);
        result.push_str("\r\n");
    }
    result
}
