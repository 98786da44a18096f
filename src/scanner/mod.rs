//! Scanner module - runs TCP probes over a set of ports.
//!
//! A scan resolves the host once, probes every requested port with bounded
//! concurrency and optional pacing, and always returns exactly one
//! [`PortOutcome`] per requested port.

pub mod detect;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;

use crate::error::{ProbeResult, ValidationError, ValidationResult};
use crate::outcome::elapsed_ms;
use crate::services::{get_service_description, EMAIL_PORTS};
use crate::session::resolve_host;
use crate::types::{Port, PortRange, PortSpec};
use crate::validate;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

pub use detect::{detect_email_server, EmailServerProfile};
pub use rate_limiter::RateLimiter;
pub use tcp::{probe_port, TcpPortProber};
pub use traits::{PortOutcome, PortProber};

/// Error text for ports not finished before the overall scan deadline.
pub const DEADLINE_EXCEEDED: &str = "scan deadline exceeded";

/// Which port set a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// The well-known email ports.
    Common,
    /// A contiguous start-end range.
    Custom,
    /// An explicit port list.
    List,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "common email ports"),
            Self::Custom => write!(f, "custom range"),
            Self::List => write!(f, "port list"),
        }
    }
}

/// A validated port scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortScanRequest {
    host: String,
    ports: Vec<Port>,
    timeout: Duration,
    mode: ScanMode,
}

impl PortScanRequest {
    /// Most ports a single scan may cover.
    pub const MAX_PORTS: usize = 1000;
    pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Scan the well-known email ports.
    pub fn common(host: impl Into<String>) -> ValidationResult<Self> {
        let ports = EMAIL_PORTS
            .iter()
            .filter_map(|e| Port::new(e.port))
            .collect();
        Self::build(host.into(), ports, ScanMode::Common)
    }

    /// Scan every port from `start` to `end` inclusive.
    pub fn custom_range(host: impl Into<String>, start: i64, end: i64) -> ValidationResult<Self> {
        let range = PortRange::new(validate::validate_port(start)?, validate::validate_port(end)?)?;
        if range.len() > Self::MAX_PORTS {
            return Err(ValidationError::TooManyPorts(range.len(), Self::MAX_PORTS));
        }
        Self::build(host.into(), range.iter().collect(), ScanMode::Custom)
    }

    /// Scan an explicit list of distinct ports, in the given order.
    pub fn new(host: impl Into<String>, ports: Vec<Port>) -> ValidationResult<Self> {
        let mut seen = HashSet::with_capacity(ports.len());
        if let Some(dup) = ports.iter().find(|p| !seen.insert(**p)) {
            return Err(ValidationError::DuplicatePort(dup.as_u16()));
        }
        Self::build(host.into(), ports, ScanMode::List)
    }

    /// Scan the ports named by a spec such as `25,465,2500-2510`.
    pub fn from_spec(host: impl Into<String>, spec: &PortSpec) -> ValidationResult<Self> {
        Self::new(host, spec.to_ports())
    }

    fn build(host: String, ports: Vec<Port>, mode: ScanMode) -> ValidationResult<Self> {
        let host = host.trim().to_string();
        validate::validate_host(&host)?;
        if ports.is_empty() {
            return Err(ValidationError::NoPorts);
        }
        if ports.len() > Self::MAX_PORTS {
            return Err(ValidationError::TooManyPorts(ports.len(), Self::MAX_PORTS));
        }
        Ok(Self {
            host,
            ports,
            timeout: Self::DEFAULT_TIMEOUT,
            mode,
        })
    }

    /// Set the per-port connect timeout, clamped to 1-30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(Self::MIN_TIMEOUT, Self::MAX_TIMEOUT);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }
}

/// Aggregated scan results, one entry per requested port.
#[derive(Debug, Clone)]
pub struct PortScanResult {
    pub host: String,
    pub mode: ScanMode,
    pub per_port: BTreeMap<u16, PortOutcome>,
    /// Wall-clock duration of the whole batch.
    pub total_elapsed_ms: u64,
    /// Whether the overall deadline cut the scan short.
    pub deadline_exceeded: bool,
}

impl PortScanResult {
    /// Ports that accepted a connection, ascending.
    pub fn open_ports(&self) -> Vec<u16> {
        self.per_port
            .values()
            .filter(|o| o.open)
            .map(|o| o.port.as_u16())
            .collect()
    }

    /// Ports that did not accept a connection, ascending.
    pub fn closed_ports(&self) -> Vec<u16> {
        self.per_port
            .values()
            .filter(|o| !o.open)
            .map(|o| o.port.as_u16())
            .collect()
    }

    pub fn get(&self, port: u16) -> Option<&PortOutcome> {
        self.per_port.get(&port)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &PortOutcome> {
        self.per_port.values()
    }
}

impl Serialize for PortScanResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PortScanResult", 7)?;
        s.serialize_field("host", &self.host)?;
        s.serialize_field("mode", &self.mode)?;
        s.serialize_field("open_ports", &self.open_ports())?;
        s.serialize_field("closed_ports", &self.closed_ports())?;
        s.serialize_field("per_port", &self.per_port)?;
        s.serialize_field("total_elapsed_ms", &self.total_elapsed_ms)?;
        s.serialize_field("deadline_exceeded", &self.deadline_exceeded)?;
        s.end()
    }
}

/// Execution knobs for a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Probes in flight at once.
    pub concurrency: usize,
    /// Probes started per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Overall deadline for the batch.
    pub deadline: Option<Duration>,
    /// Secondary wait for banners on open ports, `None` to skip.
    pub banner_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            rate_limit: 0,
            deadline: None,
            banner_timeout: Some(crate::banner::BANNER_TIMEOUT),
            show_progress: false,
        }
    }
}

/// Execute a complete port scan.
///
/// Resolution counts against both the per-port timeout and the overall
/// deadline.
pub async fn run_scan(request: &PortScanRequest, config: &ScanConfig) -> PortScanResult {
    run_scan_resolving(request, config, resolve_host(request.host())).await
}

async fn run_scan_resolving<F>(
    request: &PortScanRequest,
    config: &ScanConfig,
    lookup: F,
) -> PortScanResult
where
    F: Future<Output = ProbeResult<Vec<IpAddr>>>,
{
    let start_time = Instant::now();
    info!(host = request.host(), ports = request.ports().len(), mode = %request.mode(), "starting scan");

    let lookup_limit = config
        .deadline
        .map_or(request.timeout(), |d| d.min(request.timeout()));

    let scanned = match timeout(lookup_limit, lookup).await {
        Ok(Ok(addrs)) => match addrs.first() {
            Some(&ip) => {
                let prober = TcpPortProber::new(ip, request.timeout(), config.banner_timeout);
                let remaining = ScanConfig {
                    deadline: config
                        .deadline
                        .map(|d| d.saturating_sub(start_time.elapsed())),
                    ..config.clone()
                };
                scan_with(&prober, request.ports(), &remaining).await
            }
            None => (
                fill_all(request.ports(), "dns resolution failed: no addresses found"),
                false,
            ),
        },
        Ok(Err(e)) => {
            warn!(host = request.host(), error = %e, "resolution failed");
            (fill_all(request.ports(), &tcp::describe_error(&e)), false)
        }
        Err(_) if config.deadline == Some(lookup_limit) => {
            warn!(host = request.host(), "scan deadline exceeded while resolving");
            let mut per_port = BTreeMap::new();
            fill_unfinished(&mut per_port, request.ports(), lookup_limit);
            (per_port, true)
        }
        Err(_) => {
            warn!(host = request.host(), "resolution timed out");
            let error = format!(
                "dns resolution failed: timed out after {}ms",
                lookup_limit.as_millis()
            );
            (fill_all(request.ports(), &error), false)
        }
    };

    finish(request, start_time, scanned)
}

fn finish(
    request: &PortScanRequest,
    start_time: Instant,
    (per_port, deadline_exceeded): (BTreeMap<u16, PortOutcome>, bool),
) -> PortScanResult {
    let result = PortScanResult {
        host: request.host().to_string(),
        mode: request.mode(),
        per_port,
        total_elapsed_ms: elapsed_ms(start_time),
        deadline_exceeded,
    };
    info!(
        host = %result.host,
        open = result.open_ports().len(),
        elapsed_ms = result.total_elapsed_ms,
        "scan complete"
    );
    result
}

fn fill_all(ports: &[Port], error: &str) -> BTreeMap<u16, PortOutcome> {
    ports
        .iter()
        .map(|&port| {
            let outcome = PortOutcome::new(port, false, get_service_description(port.as_u16()))
                .with_error(error);
            (port.as_u16(), outcome)
        })
        .collect()
}

/// Probe every port with bounded concurrency.
///
/// Returns the outcomes keyed by port and whether the overall deadline
/// fired. Ports not finished by the deadline get a timeout outcome.
pub async fn scan_with<P: PortProber + ?Sized>(
    prober: &P,
    ports: &[Port],
    config: &ScanConfig,
) -> (BTreeMap<u16, PortOutcome>, bool) {
    let limiter = RateLimiter::new(config.rate_limit);
    let progress = config.show_progress.then(|| progress_bar(ports.len()));
    let mut per_port = BTreeMap::new();

    let limiter_ref = limiter.as_ref();
    let collect = async {
        let mut outcomes = stream::iter(ports.iter().copied())
            .map(|port| async move {
                if let Some(limiter) = limiter_ref {
                    limiter.wait().await;
                }
                prober.probe(port).await
            })
            .buffer_unordered(config.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            if let Some(ref pb) = progress {
                pb.inc(1);
                if outcome.open {
                    pb.set_message(format!("Found open port: {}", outcome.port));
                }
            }
            per_port.insert(outcome.port.as_u16(), outcome);
        }
    };

    let deadline_exceeded = match config.deadline {
        Some(deadline) => timeout(deadline, collect).await.is_err(),
        None => {
            collect.await;
            false
        }
    };

    if deadline_exceeded {
        warn!(finished = per_port.len(), total = ports.len(), "scan deadline exceeded");
        fill_unfinished(&mut per_port, ports, config.deadline.unwrap_or_default());
    }

    if let Some(pb) = progress {
        pb.finish_with_message("Scan complete");
    }

    (per_port, deadline_exceeded)
}

/// Give every port without an outcome a deadline-exceeded one.
fn fill_unfinished(per_port: &mut BTreeMap<u16, PortOutcome>, ports: &[Port], waited: Duration) {
    let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
    for &port in ports {
        per_port.entry(port.as_u16()).or_insert_with(|| {
            PortOutcome::new(port, false, get_service_description(port.as_u16()))
                .with_response_time(waited_ms)
                .with_error(DEADLINE_EXCEEDED)
        });
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeProber {
        open: Vec<u16>,
        delay: Duration,
    }

    #[async_trait]
    impl PortProber for FakeProber {
        async fn probe(&self, port: Port) -> PortOutcome {
            tokio::time::sleep(self.delay).await;
            let open = self.open.contains(&port.as_u16());
            let outcome = PortOutcome::new(port, open, get_service_description(port.as_u16()));
            if open {
                outcome
            } else {
                outcome.with_error("connection refused")
            }
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn quiet() -> ScanConfig {
        ScanConfig {
            banner_timeout: None,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn test_common_request() {
        let req = PortScanRequest::common("mail.example.com").unwrap();
        let ports: Vec<u16> = req.ports().iter().map(|p| p.as_u16()).collect();
        assert_eq!(ports, vec![25, 465, 587, 143, 993, 110, 995]);
        assert_eq!(req.mode(), ScanMode::Common);
        assert_eq!(req.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_custom_range_limits() {
        assert_eq!(PortScanRequest::custom_range("h", 1, 1000).unwrap().ports().len(), 1000);
        assert_eq!(
            PortScanRequest::custom_range("h", 1, 1001).unwrap_err(),
            ValidationError::TooManyPorts(1001, 1000)
        );
        assert_eq!(
            PortScanRequest::custom_range("h", 600, 500).unwrap_err(),
            ValidationError::InvalidPortRange(600, 500)
        );
        assert!(PortScanRequest::custom_range("h", 0, 10).is_err());
        assert!(PortScanRequest::custom_range("bad host", 1, 10).is_err());
    }

    #[test]
    fn test_list_request_rejects_duplicates() {
        let p = |n| Port::new(n).unwrap();
        assert_eq!(
            PortScanRequest::new("h", vec![p(25), p(587), p(25)]).unwrap_err(),
            ValidationError::DuplicatePort(25)
        );
        assert_eq!(
            PortScanRequest::new("h", vec![]).unwrap_err(),
            ValidationError::NoPorts
        );
    }

    #[test]
    fn test_timeout_clamped() {
        let req = PortScanRequest::common("h").unwrap();
        assert_eq!(req.clone().with_timeout(Duration::ZERO).timeout(), Duration::from_secs(1));
        assert_eq!(req.with_timeout(Duration::from_secs(90)).timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_one_entry_per_port() {
        let req = PortScanRequest::custom_range("h", 1, 1000).unwrap();
        let prober = FakeProber {
            open: vec![25, 587],
            delay: Duration::ZERO,
        };
        let config = ScanConfig {
            concurrency: 200,
            ..quiet()
        };

        let (per_port, exceeded) = scan_with(&prober, req.ports(), &config).await;
        assert!(!exceeded);
        assert_eq!(per_port.len(), 1000);
        assert!(per_port.keys().copied().eq(1..=1000u16));
        assert!(per_port[&25].open);
        assert!(!per_port[&26].open);
    }

    #[tokio::test]
    async fn test_deadline_fills_missing_ports() {
        let req = PortScanRequest::custom_range("h", 100, 109).unwrap();
        let prober = FakeProber {
            open: vec![],
            delay: Duration::from_secs(5),
        };
        let config = ScanConfig {
            concurrency: 2,
            deadline: Some(Duration::from_millis(100)),
            ..quiet()
        };

        let (per_port, exceeded) = scan_with(&prober, req.ports(), &config).await;
        assert!(exceeded);
        assert_eq!(per_port.len(), 10);
        assert!(per_port
            .values()
            .all(|o| !o.open && o.error.as_deref() == Some(DEADLINE_EXCEEDED)));
    }

    #[test]
    fn test_result_views_and_serialization() {
        let p = |n| Port::new(n).unwrap();
        let mut per_port = BTreeMap::new();
        per_port.insert(25, PortOutcome::new(p(25), true, "SMTP"));
        per_port.insert(110, PortOutcome::new(p(110), false, "POP3").with_error("connection refused"));
        let result = PortScanResult {
            host: "127.0.0.1".into(),
            mode: ScanMode::List,
            per_port,
            total_elapsed_ms: 12,
            deadline_exceeded: false,
        };

        assert_eq!(result.open_ports(), vec![25]);
        assert_eq!(result.closed_ports(), vec![110]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["open_ports"], serde_json::json!([25]));
        assert_eq!(json["closed_ports"], serde_json::json!([110]));
        assert_eq!(json["per_port"]["25"]["service"], "SMTP");
        assert_eq!(json["mode"], "list");
    }

    #[tokio::test]
    async fn test_slow_resolution_bounded_by_deadline() {
        let req = PortScanRequest::common("mail.example.com")
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        let config = ScanConfig {
            deadline: Some(Duration::from_millis(200)),
            ..quiet()
        };

        let started = Instant::now();
        let result = run_scan_resolving(&req, &config, std::future::pending()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result.deadline_exceeded);
        assert_eq!(result.per_port.len(), 7);
        assert!(result
            .outcomes()
            .all(|o| !o.open && o.error.as_deref() == Some(DEADLINE_EXCEEDED)));
    }

    #[tokio::test]
    async fn test_slow_resolution_bounded_by_port_timeout() {
        let req = PortScanRequest::common("mail.example.com")
            .unwrap()
            .with_timeout(Duration::from_secs(1));

        let started = Instant::now();
        let result = run_scan_resolving(&req, &quiet(), std::future::pending()).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!result.deadline_exceeded);
        assert_eq!(result.per_port.len(), 7);
        let error = result.get(25).and_then(|o| o.error.as_deref()).unwrap();
        assert!(error.starts_with("dns resolution failed: timed out"), "{error}");
    }
}
