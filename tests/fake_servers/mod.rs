//! In-process fake mail servers for integration testing.
//!
//! Each server binds `127.0.0.1:0`, speaks just enough SMTP or IMAP to
//! drive the probes through greeting, STARTTLS or implicit TLS, login and
//! the post-login commands, and shuts down when dropped.

#![allow(dead_code)]

pub mod imap;
pub mod smtp;
mod tls;

pub use imap::{FakeImapServer, ImapBehavior};
pub use smtp::{FakeSmtpServer, SendStage, SmtpBehavior};

use mailprobe::types::{Port, ProbeTarget, SecurityMode};
use tokio::net::TcpListener;

/// Whether a session should continue in TLS after the plaintext phase.
pub(crate) enum Next {
    Done,
    StartTls,
}

/// A loopback target for a fake server port.
pub fn target(port: u16, security: SecurityMode) -> ProbeTarget {
    ProbeTarget::new("127.0.0.1", Port::new(port).unwrap(), security).unwrap()
}

/// A port on which nothing is listening.
pub async fn closed_port() -> u16 {
    closed_ports(1).await[0]
}

/// `n` distinct ports on which nothing is listening.
pub async fn closed_ports(n: usize) -> Vec<u16> {
    let mut listeners = Vec::with_capacity(n);
    for _ in 0..n {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}
