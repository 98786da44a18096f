//! TCP connect probing.
//!
//! Completes the full TCP handshake using the operating system's socket
//! API, then optionally waits briefly for an unsolicited greeting.

use crate::banner::{banner_deadline, grab_banner};
use crate::error::ProbeError;
use crate::outcome::elapsed_ms;
use crate::scanner::traits::{PortOutcome, PortProber};
use crate::services::get_service_description;
use crate::session::{connect_addr, resolve_host};
use crate::types::Port;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::debug;

/// TCP connect prober bound to one resolved address.
///
/// Does not require elevated privileges.
pub struct TcpPortProber {
    target: IpAddr,
    timeout: Duration,
    banner_wait: Option<Duration>,
}

impl TcpPortProber {
    /// Create a new TCP prober.
    ///
    /// # Arguments
    /// * `target` - Resolved address to probe
    /// * `timeout` - Connection timeout per port
    /// * `banner_timeout` - Secondary wait for a greeting, `None` to skip
    pub fn new(target: IpAddr, timeout: Duration, banner_timeout: Option<Duration>) -> Self {
        Self {
            target,
            timeout,
            banner_wait: banner_timeout.map(|wait| banner_deadline(wait, timeout)),
        }
    }

    pub fn target(&self) -> IpAddr {
        self.target
    }
}

#[async_trait]
impl PortProber for TcpPortProber {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, port: Port) -> PortOutcome {
        let port_num = port.as_u16();
        let addr = SocketAddr::new(self.target, port_num);
        let service = get_service_description(port_num);
        let start = Instant::now();

        match connect_addr(addr, self.timeout).await {
            Ok(mut stream) => {
                let response_time = elapsed_ms(start);
                let banner = match self.banner_wait {
                    Some(wait) => grab_banner(&mut stream, wait).await,
                    None => None,
                };
                debug!(%addr, response_time, "port open");

                PortOutcome::new(port, true, service)
                    .with_banner(banner)
                    .with_response_time(response_time)
            }
            Err(e) => PortOutcome::new(port, false, service)
                .with_response_time(elapsed_ms(start))
                .with_error(describe_error(&e)),
        }
    }
}

/// Probe one port on a host that may still need resolving.
///
/// Resolution and connect share `timeout`.
pub async fn probe_port(
    host: &str,
    port: Port,
    timeout: Duration,
    banner_timeout: Option<Duration>,
) -> PortOutcome {
    let start = Instant::now();
    match tokio::time::timeout(timeout, resolve_host(host)).await {
        Ok(Ok(addrs)) => match addrs.first() {
            Some(&ip) => {
                let remaining = timeout.saturating_sub(start.elapsed());
                TcpPortProber::new(ip, remaining, banner_timeout).probe(port).await
            }
            None => unresolved(port, start, "dns resolution failed: no addresses found"),
        },
        Ok(Err(e)) => unresolved(port, start, &describe_error(&e)),
        Err(_) => unresolved(port, start, "dns resolution failed: timed out"),
    }
}

fn unresolved(port: Port, start: Instant, error: &str) -> PortOutcome {
    PortOutcome::new(port, false, get_service_description(port.as_u16()))
        .with_response_time(elapsed_ms(start))
        .with_error(error)
}

/// Short, distinguishing text for a failed port probe.
pub fn describe_error(e: &ProbeError) -> String {
    match e {
        ProbeError::ConnectionRefused => "connection refused".to_string(),
        ProbeError::Timeout(_) => "connection timed out".to_string(),
        ProbeError::Unreachable(_) => "host unreachable".to_string(),
        ProbeError::Dns { reason, .. } => format!("dns resolution failed: {reason}"),
        other => other.to_string(),
    }
}
