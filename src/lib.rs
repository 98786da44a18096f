//! # mailprobe - Email Server Connectivity Prober
//!
//! mailprobe checks whether a mail server is reachable and how it behaves:
//! which mail ports are open, what an SMTP server advertises, whether an
//! IMAP login works, and whether a test message is accepted.
//!
//! ## Features
//!
//! - **Port Scanning**: Common mail ports or a custom range, with banners
//! - **SMTP Probing**: Greeting, EHLO capabilities, STARTTLS and AUTH
//! - **IMAP Probing**: Login plus message counts and quota for INBOX
//! - **Test Sends**: Compose and submit a MIME message
//! - **Structured Outcomes**: Every probe returns a serializable result
//!   with a stable failure code instead of an error
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use mailprobe::smtp::SmtpProbe;
//! use mailprobe::types::{Port, ProbeTarget, SecurityMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let port = Port::new(587).unwrap();
//!     let target = ProbeTarget::new("smtp.example.com", port, SecurityMode::StartTls).unwrap();
//!
//!     let outcome = SmtpProbe::default().probe(&target).await;
//!     println!("{} ({} ms)", outcome.message, outcome.elapsed_ms);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`validate`] - Host, port, address and message field validation
//! - [`scanner`] - Concurrent TCP port scanning and mail server detection
//! - [`session`] - Connection setup, implicit TLS and STARTTLS upgrades
//! - [`smtp`] / [`imap`] - Protocol probes
//! - [`outcome`] - Result types and the failure taxonomy
//! - [`config`] - Persistent settings
//! - [`output`] - Plain, JSON and CSV rendering

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod imap;
pub mod outcome;
pub mod output;
pub mod scanner;
pub mod services;
pub mod session;
pub mod smtp;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use error::{CliError, ProbeError, ValidationError};
pub use imap::ImapProbe;
pub use outcome::{ErrorCategory, FailureKind, ImapOutcome, ProbeOutcome, SendOutcome, SmtpOutcome};
pub use scanner::{run_scan, PortScanRequest, PortScanResult, ScanConfig};
pub use session::ProbeOptions;
pub use smtp::{EmailSendRequest, SmtpProbe};
pub use types::{Credentials, Port, ProbeTarget, SecurityMode};
