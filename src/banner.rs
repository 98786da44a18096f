//! Banner grabbing for freshly opened TCP connections.
//!
//! Mail daemons (and SSH, FTP, ...) greet the client as soon as the
//! connection is accepted. We read whatever arrives within a short
//! secondary deadline and never send anything.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Maximum bytes to read for a banner.
const MAX_BANNER_SIZE: usize = 1024;

/// Maximum characters kept after sanitizing.
const MAX_BANNER_DISPLAY: usize = 256;

/// Default secondary deadline for banner grabbing.
pub const BANNER_TIMEOUT: Duration = Duration::from_secs(2);

/// Choose the banner deadline: the configured wait, capped at half the
/// connect timeout so a probe never spends longer reading than connecting.
pub fn banner_deadline(configured: Duration, connect_timeout: Duration) -> Duration {
    configured.min(connect_timeout / 2)
}

/// Read unsolicited bytes from a stream.
///
/// Returns `None` if nothing printable arrived before the deadline or the
/// peer closed the connection without sending anything.
pub async fn grab_banner<S>(stream: &mut S, wait: Duration) -> Option<String>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; MAX_BANNER_SIZE];

    match timeout(wait, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => {
            let banner = sanitize_banner(&buffer[..n]);
            (!banner.is_empty()).then_some(banner)
        }
        _ => None,
    }
}

/// Sanitize banner by removing non-printable characters and limiting length.
pub fn sanitize_banner(data: &[u8]) -> String {
    let s: String = data
        .iter()
        .take(MAX_BANNER_DISPLAY)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else if b == b'\r' || b == b'\n' || b == b'\t' {
                ' '
            } else {
                '.'
            }
        })
        .collect();

    // Collapse runs of whitespace
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c == ' ' {
            if !prev_space {
                result.push(c);
            }
            prev_space = true;
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
