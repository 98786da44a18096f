//! Name resolution and TCP connection establishment.

use crate::error::{ProbeError, ProbeResult};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Resolve a hostname or IP literal to its addresses.
///
/// IP literals are returned as-is without touching DNS.
pub async fn resolve_host(host: &str) -> ProbeResult<Vec<IpAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    });

    let response = resolver.lookup_ip(host).await.map_err(|e| ProbeError::Dns {
        host: host.to_string(),
        reason: e.to_string(),
    })?;

    let ips: Vec<IpAddr> = response.iter().collect();
    if ips.is_empty() {
        return Err(ProbeError::Dns {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        });
    }
    debug!(host, addresses = ?ips, "resolved");
    Ok(ips)
}

/// Connect to one address with a hard deadline.
pub async fn connect_addr(addr: SocketAddr, deadline: Duration) -> ProbeResult<TcpStream> {
    match timeout(deadline, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(classify_connect_error(&e, deadline)),
        Err(_) => Err(ProbeError::Timeout(deadline.as_secs())),
    }
}

/// Resolve `host` and connect to the first address that accepts.
pub async fn connect(host: &str, port: u16, deadline: Duration) -> ProbeResult<TcpStream> {
    let addrs = resolve_host(host).await?;
    let mut last_err = None;
    for ip in addrs {
        match connect_addr(SocketAddr::new(ip, port), deadline).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%ip, port, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or(ProbeError::ConnectFailed(format!(
        "no usable address for {host}"
    ))))
}

/// Map an OS connect error onto the probe error taxonomy.
pub fn classify_connect_error(e: &io::Error, deadline: Duration) -> ProbeError {
    if e.kind() == io::ErrorKind::ConnectionRefused {
        return ProbeError::ConnectionRefused;
    }
    if e.kind() == io::ErrorKind::TimedOut {
        return ProbeError::Timeout(deadline.as_secs());
    }

    let error_str = e.to_string().to_lowercase();
    if error_str.contains("refused") {
        ProbeError::ConnectionRefused
    } else if error_str.contains("unreachable") {
        ProbeError::Unreachable(e.to_string())
    } else {
        ProbeError::ConnectFailed(e.to_string())
    }
}
