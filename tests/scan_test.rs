//! Integration tests for the port scanner against real loopback listeners.

mod fake_servers;

use fake_servers::{closed_port, closed_ports};
use mailprobe::scanner::{run_scan, PortScanRequest, ScanConfig, ScanMode};
use mailprobe::types::Port;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_test::assert_ok;

/// A listener that greets each connection with `banner`, if any.
async fn listening_port(banner: Option<&'static str>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            if let Some(banner) = banner {
                let _ = sock.write_all(banner.as_bytes()).await;
            }
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(sock);
            });
        }
    });
    port
}

fn request(ports: &[u16]) -> PortScanRequest {
    let ports = ports.iter().map(|&p| Port::new(p).unwrap()).collect();
    assert_ok!(PortScanRequest::new("127.0.0.1", ports)).with_timeout(Duration::from_secs(2))
}

fn quiet_config() -> ScanConfig {
    ScanConfig {
        banner_timeout: None,
        ..ScanConfig::default()
    }
}

#[tokio::test]
async fn test_one_open_two_closed() {
    let open = listening_port(None).await;
    let closed = closed_ports(2).await;
    let (closed_a, closed_b) = (closed[0], closed[1]);

    let result = run_scan(&request(&[open, closed_a, closed_b]), &quiet_config()).await;

    assert_eq!(result.per_port.len(), 3);
    assert_eq!(result.mode, ScanMode::List);
    assert_eq!(result.open_ports(), vec![open]);

    let mut closed = vec![closed_a, closed_b];
    closed.sort_unstable();
    assert_eq!(result.closed_ports(), closed);
    assert!(!result.deadline_exceeded);

    let refused = result.get(closed_a).unwrap();
    assert!(!refused.open);
    assert_eq!(refused.error.as_deref(), Some("connection refused"));
}

#[tokio::test]
async fn test_closed_port_answers_within_timeout() {
    let port = closed_port().await;

    let started = Instant::now();
    let result = run_scan(&request(&[port]), &quiet_config()).await;

    assert!(started.elapsed() < Duration::from_secs(2) + Duration::from_millis(500));
    assert!(!result.get(port).unwrap().open);
}

#[tokio::test]
async fn test_banner_captured_on_open_port() {
    let port = listening_port(Some("220 mx.fake.test ESMTP Postfix\r\n")).await;

    let result = run_scan(&request(&[port]), &ScanConfig::default()).await;

    let outcome = result.get(port).unwrap();
    assert!(outcome.open);
    assert_eq!(outcome.banner.as_deref(), Some("220 mx.fake.test ESMTP Postfix"));
}

#[tokio::test]
async fn test_repeated_scans_agree() {
    let open = listening_port(None).await;
    let closed = closed_port().await;
    let request = request(&[open, closed]);

    let first = run_scan(&request, &quiet_config()).await;
    let second = run_scan(&request, &quiet_config()).await;

    assert_eq!(first.open_ports(), second.open_ports());
    assert_eq!(first.closed_ports(), second.closed_ports());
}

#[tokio::test]
async fn test_json_shape() {
    let open = listening_port(None).await;
    let result = run_scan(&request(&[open]), &quiet_config()).await;

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["host"], "127.0.0.1");
    assert_eq!(value["open_ports"][0], open);
    assert_eq!(value["per_port"][open.to_string()]["open"], true);
}
