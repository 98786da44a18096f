//! Fake IMAP server.

use super::tls::acceptor;
use super::Next;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// How the fake IMAP server behaves.
#[derive(Debug, Clone)]
pub struct ImapBehavior {
    /// Greeting line override. By default the greeting carries the
    /// capability list as a response code.
    pub greeting: Option<String>,
    pub advertise_starttls: bool,
    pub implicit_tls: bool,
    pub login_disabled: bool,
    pub username: String,
    pub password: String,
    pub exists: u32,
    pub recent: u32,
    pub unseen: u32,
    /// Advertise STATUS=SIZE and report this size.
    pub mailbox_size: Option<u64>,
    /// Answer STATUS with BAD so the client falls back to SEARCH.
    pub reject_status: bool,
    /// Advertise QUOTA and report `(used, limit)` in kilobytes.
    pub quota_kb: Option<(u64, u64)>,
}

impl Default for ImapBehavior {
    fn default() -> Self {
        Self {
            greeting: None,
            advertise_starttls: false,
            implicit_tls: false,
            login_disabled: false,
            username: "alice@fake.test".to_string(),
            password: "p\"ss\\word".to_string(),
            exists: 12,
            recent: 1,
            unseen: 3,
            mailbox_size: None,
            reject_status: false,
            quota_kb: None,
        }
    }
}

pub struct FakeImapServer {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(behavior: ImapBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = acceptor();
        let behavior = Arc::new(behavior);
        let commands = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&commands);
        let handle = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let behavior = Arc::clone(&behavior);
                let acceptor = acceptor.clone();
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    handle_connection(tcp, &behavior, &acceptor, &seen).await;
                });
            }
        });

        Self {
            port,
            commands,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Command names received so far, upper-cased, across all sessions.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut tcp: TcpStream,
    behavior: &ImapBehavior,
    acceptor: &TlsAcceptor,
    seen: &Mutex<Vec<String>>,
) {
    if behavior.implicit_tls {
        if let Ok(tls) = acceptor.accept(tcp).await {
            serve(tls, behavior, true, true, seen).await;
        }
        return;
    }

    if let Next::StartTls = serve(&mut tcp, behavior, true, false, seen).await {
        if let Ok(tls) = acceptor.accept(tcp).await {
            serve(tls, behavior, false, true, seen).await;
        }
    }
}

fn greeting(behavior: &ImapBehavior, tls: bool) -> String {
    match &behavior.greeting {
        Some(line) => line.clone(),
        None => format!(
            "* OK [CAPABILITY {}] fake.test IMAP ready",
            capabilities(behavior, tls)
        ),
    }
}

fn capabilities(behavior: &ImapBehavior, tls: bool) -> String {
    let mut caps = vec!["IMAP4rev1"];
    if behavior.advertise_starttls && !tls {
        caps.push("STARTTLS");
    }
    if behavior.login_disabled {
        caps.push("LOGINDISABLED");
    }
    if behavior.mailbox_size.is_some() {
        caps.push("STATUS=SIZE");
    }
    if behavior.quota_kb.is_some() {
        caps.push("QUOTA");
    }
    caps.join(" ")
}

async fn serve<S>(
    stream: S,
    behavior: &ImapBehavior,
    greet: bool,
    tls: bool,
    seen: &Mutex<Vec<String>>,
) -> Next
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = BufReader::new(stream);
    if greet && send(&mut conn, &format!("{}\r\n", greeting(behavior, tls))).await.is_err() {
        return Next::Done;
    }

    let mut authenticated = false;
    while let Some(line) = read(&mut conn).await {
        let (tag, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let (command, args) = rest.split_once(' ').unwrap_or((rest, ""));
        seen.lock().unwrap().push(command.to_ascii_uppercase());

        let reply = match command.to_ascii_uppercase().as_str() {
            "CAPABILITY" => format!(
                "* CAPABILITY {}\r\n{tag} OK CAPABILITY completed\r\n",
                capabilities(behavior, tls)
            ),
            "STARTTLS" => {
                let _ = send(&mut conn, &format!("{tag} OK Begin TLS negotiation now\r\n")).await;
                return Next::StartTls;
            }
            "LOGIN" => {
                let ok = !behavior.login_disabled
                    && parse_quoted_pair(args)
                        == Some((behavior.username.clone(), behavior.password.clone()));
                if ok {
                    authenticated = true;
                    format!("{tag} OK [CAPABILITY {}] LOGIN completed\r\n", capabilities(behavior, tls))
                } else {
                    format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                }
            }
            "SELECT" if authenticated => format!(
                "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
                 * {} EXISTS\r\n\
                 * {} RECENT\r\n\
                 * OK [UIDVALIDITY 1] UIDs valid\r\n\
                 {tag} OK [READ-WRITE] SELECT completed\r\n",
                behavior.exists, behavior.recent
            ),
            "STATUS" if authenticated && !behavior.reject_status => {
                let size = behavior
                    .mailbox_size
                    .filter(|_| args.to_ascii_uppercase().contains("SIZE"))
                    .map(|s| format!(" SIZE {s}"))
                    .unwrap_or_default();
                format!(
                    "* STATUS INBOX (UNSEEN {}{size})\r\n{tag} OK STATUS completed\r\n",
                    behavior.unseen
                )
            }
            "SEARCH" if authenticated => {
                let hits: Vec<String> = (1..=behavior.unseen).map(|n| n.to_string()).collect();
                format!("* SEARCH {}\r\n{tag} OK SEARCH completed\r\n", hits.join(" "))
            }
            "GETQUOTAROOT" if authenticated => match behavior.quota_kb {
                Some((used, limit)) => format!(
                    "* QUOTAROOT INBOX \"\"\r\n* QUOTA \"\" (STORAGE {used} {limit})\r\n{tag} OK GETQUOTAROOT completed\r\n"
                ),
                None => format!("{tag} BAD unknown command\r\n"),
            },
            "LOGOUT" => {
                let _ = send(&mut conn, &format!("* BYE logging out\r\n{tag} OK LOGOUT completed\r\n")).await;
                return Next::Done;
            }
            "SELECT" | "STATUS" | "SEARCH" | "GETQUOTAROOT" if !authenticated => {
                format!("{tag} NO not authenticated\r\n")
            }
            _ => format!("{tag} BAD unknown command\r\n"),
        };

        if send(&mut conn, &reply).await.is_err() {
            return Next::Done;
        }
    }
    Next::Done
}

/// Parse two IMAP quoted strings, undoing backslash escapes.
fn parse_quoted_pair(args: &str) -> Option<(String, String)> {
    let mut values = Vec::new();
    let mut chars = args.chars();
    while values.len() < 2 {
        match chars.next()? {
            ' ' => continue,
            '"' => {
                let mut value = String::new();
                loop {
                    match chars.next()? {
                        '\\' => value.push(chars.next()?),
                        '"' => break,
                        c => value.push(c),
                    }
                }
                values.push(value);
            }
            _ => return None,
        }
    }
    let secret = values.pop()?;
    let user = values.pop()?;
    Some((user, secret))
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
