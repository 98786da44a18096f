//! Tagged-command IMAP client over a probe [`Connection`].

use crate::error::{ProbeError, ProbeResult};
use crate::imap::response::{self, SearchTally, Status, TaggedResponse};
use crate::session::{Connection, TlsOptions, MAX_LINE_LEN, MAX_RESPONSE_LINES};
use tracing::debug;

/// What the server said when the connection opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// `* PREAUTH`: the session is already authenticated.
    pub preauth: bool,
    /// Capabilities embedded as a `[CAPABILITY ...]` response code.
    pub capabilities: Option<Vec<String>>,
    pub text: String,
}

/// Longest `* SEARCH` line accepted. Hits are counted while streaming, so
/// this bounds bytes read, not memory held.
pub const MAX_SEARCH_LINE: usize = 16 * 1024 * 1024;

pub struct ImapClient {
    conn: Connection,
    next_tag: u32,
}

impl ImapClient {
    pub fn new(conn: Connection) -> Self {
        Self { conn, next_tag: 1 }
    }

    pub fn is_tls(&self) -> bool {
        self.conn.is_tls()
    }

    fn tag(&mut self) -> String {
        let tag = format!("A{:03}", self.next_tag);
        self.next_tag += 1;
        tag
    }

    /// Read the untagged greeting. `* BYE` ends the session.
    pub async fn greeting(&mut self) -> ProbeResult<Greeting> {
        let line = self.conn.read_line().await?;
        let upper = line.to_ascii_uppercase();

        let preauth = if upper.starts_with("* OK") {
            false
        } else if upper.starts_with("* PREAUTH") {
            true
        } else if upper.starts_with("* BYE") {
            return Err(ProbeError::GreetingRejected(line));
        } else {
            return Err(ProbeError::Protocol(format!("unexpected greeting: {line}")));
        };

        Ok(Greeting {
            preauth,
            capabilities: response::parse_capabilities(&line),
            text: line,
        })
    }

    /// Send a command and collect lines until its tagged completion.
    pub async fn command(&mut self, cmd: &str) -> ProbeResult<TaggedResponse> {
        let tag = self.tag();
        self.conn.write_line(&format!("{tag} {cmd}")).await?;
        self.read_tagged(&tag).await
    }

    /// Like [`command`](Self::command), logging `shown` in place of `cmd`.
    pub async fn secret_command(&mut self, cmd: &str, shown: &str) -> ProbeResult<TaggedResponse> {
        let tag = self.tag();
        self.conn
            .write_secret(&format!("{tag} {cmd}"), &format!("{tag} {shown}"))
            .await?;
        self.read_tagged(&tag).await
    }

    async fn read_tagged(&mut self, tag: &str) -> ProbeResult<TaggedResponse> {
        let mut untagged = Vec::new();
        // Bytes of a literal still to be skipped; literal payloads may span lines.
        let mut literal_left = 0usize;

        for _ in 0..MAX_RESPONSE_LINES {
            let line = self.conn.read_line().await?;

            if literal_left > 0 {
                literal_left = literal_left.saturating_sub(line.len() + 2);
                continue;
            }
            if let Some((status, text)) = response::parse_tagged(&line, tag) {
                return Ok(TaggedResponse {
                    status,
                    text: text.to_string(),
                    untagged,
                });
            }
            if let Some(n) = response::trailing_literal(&line) {
                literal_left = n;
            }
            untagged.push(line);
        }

        Err(ProbeError::Protocol(format!(
            "no completion for {tag} within {MAX_RESPONSE_LINES} lines"
        )))
    }

    /// `SEARCH criteria`, returning the number of hits.
    ///
    /// `None` when the server refuses the search. The hit list is never
    /// held in memory, so mailboxes with many matches do not trip the line
    /// limit.
    pub async fn search_count(&mut self, criteria: &str) -> ProbeResult<Option<u32>> {
        let tag = self.tag();
        self.conn.write_line(&format!("{tag} SEARCH {criteria}")).await?;

        let mut hits = None;
        for _ in 0..MAX_RESPONSE_LINES {
            let mut tally = SearchTally::default();
            let len = self
                .conn
                .stream_line(MAX_SEARCH_LINE, |chunk| tally.feed(chunk))
                .await?;
            let head = tally.head();

            if let Some((status, text)) = response::parse_tagged(&head, &tag) {
                if status != Status::Ok {
                    debug!(reply = %text, "SEARCH refused");
                    return Ok(None);
                }
                return Ok(hits);
            }
            match tally.hits() {
                Some(n) => hits = Some(hits.unwrap_or(0) + n),
                None if len > MAX_LINE_LEN => {
                    return Err(ProbeError::Protocol(format!(
                        "response line exceeds {MAX_LINE_LEN} bytes"
                    )));
                }
                None => {}
            }
        }

        Err(ProbeError::Protocol(format!(
            "no completion for {tag} within {MAX_RESPONSE_LINES} lines"
        )))
    }

    /// `CAPABILITY`, returning the advertised list.
    pub async fn capability(&mut self) -> ProbeResult<Vec<String>> {
        let resp = self.command("CAPABILITY").await?;
        if !resp.is_ok() {
            return Err(ProbeError::Protocol(format!(
                "CAPABILITY failed: {}",
                resp.text
            )));
        }
        resp.untagged
            .iter()
            .find_map(|l| response::parse_capabilities(l))
            .ok_or_else(|| ProbeError::Protocol("CAPABILITY response missing".to_string()))
    }

    /// Issue STARTTLS and perform the handshake on the same socket.
    pub async fn starttls(mut self, tls: TlsOptions) -> ProbeResult<Self> {
        let resp = self.command("STARTTLS").await?;
        if !resp.is_ok() {
            return Err(ProbeError::StartTlsRejected(resp.text));
        }
        let conn = self.conn.upgrade(tls).await?;
        Ok(Self { conn, ..self })
    }

    /// `LOGIN` with pre-quoted arguments.
    ///
    /// Returns capabilities the server attached to its OK, if any.
    pub async fn login(
        &mut self,
        quoted_user: &str,
        quoted_secret: &str,
    ) -> ProbeResult<Option<Vec<String>>> {
        let resp = self
            .secret_command(
                &format!("LOGIN {quoted_user} {quoted_secret}"),
                &format!("LOGIN {quoted_user} \"********\""),
            )
            .await?;
        match resp.status {
            Status::Ok => Ok(response::parse_capabilities(&resp.text)),
            Status::No => Err(ProbeError::AuthFailed(resp.text)),
            Status::Bad => Err(ProbeError::AuthFailed(format!("LOGIN rejected: {}", resp.text))),
        }
    }

    /// Say goodbye and close. Errors are ignored.
    pub async fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT").await {
            debug!(error = %e, "LOGOUT failed");
        }
        self.conn.shutdown().await;
    }
}
