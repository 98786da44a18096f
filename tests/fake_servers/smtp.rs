//! Fake SMTP server.

use super::tls::acceptor;
use super::Next;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// A point in the mail transaction where the server can refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    MailFrom,
    RcptTo,
    Content,
}

impl SendStage {
    /// The 5xx line the server answers with at this stage.
    pub fn reply(self) -> &'static str {
        match self {
            Self::MailFrom => "553 5.7.1 Sender address rejected: not owned by user",
            Self::RcptTo => "550 5.1.1 Recipient address rejected: User unknown",
            Self::Content => "554 5.7.1 Message rejected as spam",
        }
    }
}

/// How the fake SMTP server behaves.
#[derive(Debug, Clone)]
pub struct SmtpBehavior {
    /// Full greeting line, code included.
    pub greeting: String,
    pub advertise_starttls: bool,
    /// Negotiate TLS immediately after accept.
    pub implicit_tls: bool,
    /// Mechanisms listed on the AUTH line, empty for no AUTH.
    pub auth_mechanisms: &'static str,
    pub username: String,
    pub password: String,
    /// Answer EHLO with 502 so the client falls back to HELO.
    pub reject_ehlo: bool,
    /// Accept the TCP connection but never say anything.
    pub silent: bool,
    /// Advertise STARTTLS but answer it with 454.
    pub reject_starttls: bool,
    /// Refuse the mail transaction at this stage.
    pub reject_send: Option<SendStage>,
    pub queue_id: &'static str,
}

impl Default for SmtpBehavior {
    fn default() -> Self {
        Self {
            greeting: "220 fake.test ESMTP ready".to_string(),
            advertise_starttls: false,
            implicit_tls: false,
            auth_mechanisms: "PLAIN LOGIN",
            username: "user@fake.test".to_string(),
            password: "s3cret".to_string(),
            reject_ehlo: false,
            silent: false,
            reject_starttls: false,
            reject_send: None,
            queue_id: "4FQx1Z0abc",
        }
    }
}

pub struct FakeSmtpServer {
    port: u16,
    messages: Arc<Mutex<Vec<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeSmtpServer {
    pub async fn start(behavior: SmtpBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let acceptor = acceptor();
        let behavior = Arc::new(behavior);

        let stored = Arc::clone(&messages);
        let handle = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let behavior = Arc::clone(&behavior);
                let acceptor = acceptor.clone();
                let stored = Arc::clone(&stored);
                tokio::spawn(async move {
                    handle_connection(tcp, &behavior, &acceptor, &stored).await;
                });
            }
        });

        Self {
            port,
            messages,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Message contents received through DATA.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Drop for FakeSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut tcp: TcpStream,
    behavior: &SmtpBehavior,
    acceptor: &TlsAcceptor,
    stored: &Mutex<Vec<String>>,
) {
    if behavior.silent {
        tokio::time::sleep(std::time::Duration::from_secs(300)).await;
        return;
    }

    if behavior.implicit_tls {
        if let Ok(tls) = acceptor.accept(tcp).await {
            serve(tls, behavior, true, true, stored).await;
        }
        return;
    }

    if let Next::StartTls = serve(&mut tcp, behavior, true, false, stored).await {
        if let Ok(tls) = acceptor.accept(tcp).await {
            serve(tls, behavior, false, true, stored).await;
        }
    }
}

async fn serve<S>(
    stream: S,
    behavior: &SmtpBehavior,
    greet: bool,
    tls: bool,
    stored: &Mutex<Vec<String>>,
) -> Next
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = BufReader::new(stream);
    if greet && send(&mut conn, &format!("{}\r\n", behavior.greeting)).await.is_err() {
        return Next::Done;
    }

    while let Some(line) = read(&mut conn).await {
        let upper = line.to_ascii_uppercase();
        let reply = if upper.starts_with("EHLO") {
            if behavior.reject_ehlo {
                "502 5.5.2 Error: command not recognized\r\n".to_string()
            } else {
                ehlo_reply(behavior, tls)
            }
        } else if upper.starts_with("HELO") {
            "250 fake.test\r\n".to_string()
        } else if upper == "STARTTLS" && behavior.reject_starttls {
            "454 4.7.0 TLS not available due to local problem\r\n".to_string()
        } else if upper == "STARTTLS" {
            let _ = send(&mut conn, "220 2.0.0 Ready to start TLS\r\n").await;
            return Next::StartTls;
        } else if let Some(payload) = line.strip_prefix("AUTH PLAIN ") {
            let decoded = STANDARD.decode(payload).unwrap_or_default();
            let expected = format!("\0{}\0{}", behavior.username, behavior.password);
            auth_result(decoded == expected.as_bytes())
        } else if upper == "AUTH LOGIN" {
            if send(&mut conn, "334 VXNlcm5hbWU6\r\n").await.is_err() {
                return Next::Done;
            }
            let Some(user) = read(&mut conn).await else {
                return Next::Done;
            };
            if send(&mut conn, "334 UGFzc3dvcmQ6\r\n").await.is_err() {
                return Next::Done;
            }
            let Some(pass) = read(&mut conn).await else {
                return Next::Done;
            };
            auth_result(
                STANDARD.decode(user).unwrap_or_default() == behavior.username.as_bytes()
                    && STANDARD.decode(pass).unwrap_or_default() == behavior.password.as_bytes(),
            )
        } else if upper.starts_with("MAIL FROM:") {
            stage_reply(behavior, SendStage::MailFrom, "250 2.1.0 Ok")
        } else if upper.starts_with("RCPT TO:") {
            stage_reply(behavior, SendStage::RcptTo, "250 2.1.5 Ok")
        } else if upper == "DATA" {
            if send(&mut conn, "354 End data with <CR><LF>.<CR><LF>\r\n").await.is_err() {
                return Next::Done;
            }
            let mut message = String::new();
            while let Some(data) = read(&mut conn).await {
                if data == "." {
                    break;
                }
                message.push_str(&data);
                message.push_str("\r\n");
            }
            if behavior.reject_send == Some(SendStage::Content) {
                format!("{}\r\n", SendStage::Content.reply())
            } else {
                stored.lock().unwrap().push(message);
                format!("250 2.0.0 Ok: queued as {}\r\n", behavior.queue_id)
            }
        } else if upper == "QUIT" {
            let _ = send(&mut conn, "221 2.0.0 Bye\r\n").await;
            return Next::Done;
        } else {
            "502 5.5.2 Error: command not recognized\r\n".to_string()
        };

        if send(&mut conn, &reply).await.is_err() {
            return Next::Done;
        }
    }
    Next::Done
}

fn ehlo_reply(behavior: &SmtpBehavior, tls: bool) -> String {
    let mut lines = vec!["fake.test".to_string(), "PIPELINING".to_string(), "SIZE 10240000".to_string()];
    if behavior.advertise_starttls && !tls {
        lines.push("STARTTLS".to_string());
    }
    if !behavior.auth_mechanisms.is_empty() {
        lines.push(format!("AUTH {}", behavior.auth_mechanisms));
    }
    lines.push("8BITMIME".to_string());

    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("250{}{}\r\n", if i == last { ' ' } else { '-' }, l))
        .collect()
}

fn stage_reply(behavior: &SmtpBehavior, stage: SendStage, ok: &str) -> String {
    if behavior.reject_send == Some(stage) {
        format!("{}\r\n", stage.reply())
    } else {
        format!("{ok}\r\n")
    }
}

fn auth_result(ok: bool) -> String {
    if ok {
        "235 2.7.0 Authentication successful\r\n".to_string()
    } else {
        "535 5.7.8 Error: authentication failed\r\n".to_string()
    }
}

async fn read<S: AsyncRead + Unpin>(conn: &mut BufReader<S>) -> Option<String> {
    let mut line = String::new();
    match conn.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

async fn send<S>(conn: &mut BufReader<S>, data: &str) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.get_mut().write_all(data.as_bytes()).await?;
    conn.get_mut().flush().await
}
