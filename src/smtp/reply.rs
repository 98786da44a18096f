//! SMTP reply parsing (RFC 5321 section 4.2).
//!
//! A reply is one or more lines sharing a three-digit code. `NNN-text`
//! means more lines follow; `NNN text` (or a bare `NNN`) ends the reply.

use crate::error::{ProbeError, ProbeResult};
use crate::session::{Connection, MAX_RESPONSE_LINES};
use std::fmt;

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Text of each line with the code and separator removed.
    pub lines: Vec<String>,
}

impl Reply {
    /// 2xx
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 5xx
    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// All lines joined with spaces.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Text of the first line.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.text();
        if text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, text)
        }
    }
}

/// Split one reply line into code, "last line" flag and text.
pub fn parse_line(line: &str) -> ProbeResult<(u16, bool, &str)> {
    let code = line
        .get(..3)
        .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| ProbeError::Protocol(format!("malformed SMTP reply line: '{line}'")))?;

    match line.as_bytes().get(3) {
        None => Ok((code, true, "")),
        Some(b' ') => Ok((code, true, &line[4..])),
        Some(b'-') => Ok((code, false, &line[4..])),
        Some(_) => Err(ProbeError::Protocol(format!(
            "malformed SMTP reply line: '{line}'"
        ))),
    }
}

/// Read a complete reply, bounded to [`MAX_RESPONSE_LINES`] lines.
pub async fn read_reply(conn: &mut Connection) -> ProbeResult<Reply> {
    let mut lines = Vec::new();
    let mut reply_code = None;

    loop {
        let line = conn.read_line().await?;
        let (code, last, text) = parse_line(&line)?;
        let expected = *reply_code.get_or_insert(code);
        if code != expected {
            return Err(ProbeError::Protocol(format!(
                "reply code changed mid-reply ({expected} then {code})"
            )));
        }
        lines.push(text.to_string());

        if last {
            return Ok(Reply {
                code: expected,
                lines,
            });
        }
        if lines.len() >= MAX_RESPONSE_LINES {
            return Err(ProbeError::Protocol(format!(
                "reply exceeds {MAX_RESPONSE_LINES} lines"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("220 ready").unwrap(), (220, true, "ready"));
        assert_eq!(parse_line("250-SIZE 1000").unwrap(), (250, false, "SIZE 1000"));
        assert_eq!(parse_line("250").unwrap(), (250, true, ""));
        assert!(parse_line("OK").is_err());
        assert!(parse_line("25x ready").is_err());
        assert!(parse_line("250+foo").is_err());
    }

    #[test]
    fn test_reply_classes() {
        let reply = Reply {
            code: 354,
            lines: vec!["End data with <CR><LF>.<CR><LF>".into()],
        };
        assert!(reply.is_intermediate());
        assert!(!reply.is_positive());
        assert_eq!(reply.to_string(), "354 End data with <CR><LF>.<CR><LF>");
    }

    async fn served(data: &'static [u8]) -> Connection {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(data).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        });
        Connection::plain("127.0.0.1", TcpStream::connect(addr).await.unwrap())
    }

    #[tokio::test]
    async fn test_read_multiline_reply() {
        let mut conn = served(b"250-mx.example.com\r\n250-PIPELINING\r\n250 AUTH PLAIN LOGIN\r\n").await;
        let reply = read_reply(&mut conn).await.unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(
            reply.lines,
            vec!["mx.example.com", "PIPELINING", "AUTH PLAIN LOGIN"]
        );
    }

    #[tokio::test]
    async fn test_endless_reply_is_bounded() {
        let mut data = Vec::new();
        for _ in 0..150 {
            data.extend_from_slice(b"250-X\r\n");
        }
        let data: &'static [u8] = Box::leak(data.into_boxed_slice());
        let mut conn = served(data).await;
        assert!(matches!(
            read_reply(&mut conn).await,
            Err(ProbeError::Protocol(_))
        ));
    }
}
