//! Line-oriented connection shared by the SMTP and IMAP probes.

use crate::error::{ProbeError, ProbeResult};
use crate::session::stream::ProbeStream;
use crate::session::tls::{self, TlsOptions};
use crate::session::transcript::Transcript;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Longest accepted response line, terminator included.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Most lines accepted for one reply or one tagged command.
pub const MAX_RESPONSE_LINES: usize = 100;

/// A buffered CRLF line connection over plaintext or TLS.
pub struct Connection {
    host: String,
    reader: BufReader<ProbeStream>,
    transcript: Option<Transcript>,
}

impl Connection {
    pub fn new(host: impl Into<String>, stream: ProbeStream) -> Self {
        Self {
            host: host.into(),
            reader: BufReader::new(stream),
            transcript: None,
        }
    }

    /// Record every line sent and received into `transcript`.
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn plain(host: impl Into<String>, tcp: TcpStream) -> Self {
        Self::new(host, ProbeStream::Plain(tcp))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }

    /// Read one line with the terminator stripped.
    ///
    /// A final line without a terminator is returned as-is. Lines longer
    /// than [`MAX_LINE_LEN`] are a protocol error.
    pub async fn read_line(&mut self) -> ProbeResult<String> {
        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;

        if n == 0 {
            return Err(ProbeError::ConnectionClosed);
        }
        if buf.len() > MAX_LINE_LEN {
            return Err(ProbeError::Protocol(format!(
                "response line exceeds {MAX_LINE_LEN} bytes"
            )));
        }

        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        debug!(host = %self.host, "<<< {}", line);
        if let Some(t) = &self.transcript {
            t.server(&line);
        }
        Ok(line)
    }

    /// Feed one line to `sink` in buffer-sized pieces, terminator included.
    ///
    /// Unlike [`read_line`](Self::read_line) nothing is accumulated, so a
    /// line may run up to `limit` bytes. Returns the bytes consumed.
    pub async fn stream_line<F>(&mut self, limit: usize, mut sink: F) -> ProbeResult<usize>
    where
        F: FnMut(&[u8]),
    {
        let mut total = 0usize;
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return if total == 0 {
                    Err(ProbeError::ConnectionClosed)
                } else {
                    Ok(total)
                };
            }

            let (len, done) = match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            total += len;
            if total > limit {
                return Err(ProbeError::Protocol(format!(
                    "response line exceeds {limit} bytes"
                )));
            }
            sink(&buf[..len]);
            self.reader.consume(len);

            if done {
                debug!(host = %self.host, bytes = total, "<<< (streamed line)");
                return Ok(total);
            }
        }
    }

    /// Send one command line, appending CRLF.
    pub async fn write_line(&mut self, line: &str) -> ProbeResult<()> {
        debug!(host = %self.host, ">>> {}", line);
        if let Some(t) = &self.transcript {
            t.client(line);
        }
        self.send(line).await
    }

    /// Send a line whose content must not reach the logs.
    pub async fn write_secret(&mut self, line: &str, shown: &str) -> ProbeResult<()> {
        debug!(host = %self.host, ">>> {}", shown);
        if let Some(t) = &self.transcript {
            t.client(shown);
        }
        self.send(line).await
    }

    /// Send raw bytes as-is (message bodies).
    pub async fn write_raw(&mut self, data: &[u8]) -> ProbeResult<()> {
        if let Some(t) = &self.transcript {
            t.client(&format!("<{} bytes of message content>", data.len()));
        }
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn send(&mut self, line: &str) -> ProbeResult<()> {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Perform the TLS handshake on the same socket after STARTTLS.
    ///
    /// Fails if the server sent anything after its STARTTLS reply, since
    /// those bytes would otherwise be treated as if they arrived over TLS.
    pub async fn upgrade(self, options: TlsOptions) -> ProbeResult<Self> {
        if !self.reader.buffer().is_empty() {
            return Err(ProbeError::StartTlsRejected(
                "server sent data before the TLS handshake".to_string(),
            ));
        }

        let Self {
            host,
            reader,
            transcript,
        } = self;
        match reader.into_inner() {
            ProbeStream::Plain(tcp) => {
                let tls = tls::handshake(tcp, &host, options).await?;
                let mut upgraded = Self::new(host, ProbeStream::Tls(Box::new(tls)));
                upgraded.transcript = transcript;
                Ok(upgraded)
            }
            ProbeStream::Tls(_) => Err(ProbeError::Protocol(
                "connection is already using TLS".to_string(),
            )),
        }
    }

    /// Close the write side, ignoring errors.
    pub async fn shutdown(mut self) {
        let _ = self.reader.get_mut().shutdown().await;
    }
}
