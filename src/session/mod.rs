//! Secure session negotiation.
//!
//! Opens the TCP connection for a protocol probe and applies the requested
//! [`SecurityMode`]: plaintext is left alone, implicit TLS is negotiated
//! before any protocol bytes, and STARTTLS upgrades are performed on
//! request by the protocol modules via [`Connection::upgrade`].

mod connect;
mod connection;
mod stream;
mod tls;
mod transcript;

pub use connect::{classify_connect_error, connect, connect_addr, resolve_host};
pub use connection::{Connection, MAX_LINE_LEN, MAX_RESPONSE_LINES};
pub use stream::ProbeStream;
pub use tls::{build_connector, handshake, TlsOptions};
pub use transcript::{Transcript, MAX_TRANSCRIPT_ENTRIES};

use crate::error::{ProbeError, ProbeResult};
use crate::types::{ProbeTarget, SecurityMode};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Engine-wide knobs shared by every protocol probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub tls: TlsOptions,
    /// Name announced in EHLO/HELO.
    pub client_identifier: String,
    /// Number of capability lines kept in results.
    pub capability_limit: usize,
    /// Secondary deadline for reading banners on open ports.
    pub banner_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            tls: TlsOptions::default(),
            client_identifier: "mailprobe.localdomain".to_string(),
            capability_limit: 10,
            banner_timeout: crate::banner::BANNER_TIMEOUT,
        }
    }
}

/// Connect to the target and apply implicit TLS when requested.
///
/// For [`SecurityMode::StartTls`] the returned connection is plaintext;
/// the protocol probe decides when to upgrade.
pub async fn open(target: &ProbeTarget, tls: TlsOptions) -> ProbeResult<Connection> {
    let port = target.port().as_u16();
    let tcp = connect(target.host(), port, target.timeout()).await?;
    debug!(target = %target, "connected");

    match target.security() {
        SecurityMode::ImplicitTls => {
            let stream = handshake(tcp, target.host(), tls).await?;
            Ok(Connection::new(
                target.host(),
                ProbeStream::Tls(Box::new(stream)),
            ))
        }
        SecurityMode::None | SecurityMode::StartTls => Ok(Connection::plain(target.host(), tcp)),
    }
}

/// Run a whole probe under the target's overall deadline.
///
/// On expiry the future is dropped, which closes its socket.
pub async fn within_deadline<T>(
    target: &ProbeTarget,
    fut: impl Future<Output = ProbeResult<T>>,
) -> ProbeResult<T> {
    match timeout(target.timeout(), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(target.timeout().as_secs())),
    }
}
