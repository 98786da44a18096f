//! Scan subcommand implementation.
//!
//! Handles the `mailprobe scan <host>` command.

use crate::cli::{Completion, Context, OutputFormat};
use crate::error::{CliResult, ValidationError};
use crate::output::{self, Report};
use crate::scanner::{detect_email_server, run_scan, PortScanRequest};
use crate::types::PortSpec;
use clap::Parser;
use std::time::Duration;

/// Scan a host's mail ports, or a custom port range.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Hostname or IP address to scan
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Scan a contiguous range instead of the common mail ports (e.g. "1-1000")
    #[arg(long, value_name = "START-END", conflicts_with = "ports")]
    pub custom: Option<String>,

    /// Scan an explicit port list (e.g. "25,465,587,2500-2510")
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Per-port connect timeout in seconds (1-30)
    #[arg(short = 't', long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of ports probed at once
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Rate limit in probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Give up on the whole scan after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Summarise which mail services the open ports indicate
    #[arg(long)]
    pub detect: bool,
}

impl ScanCommand {
    fn request(&self, default_timeout: u64) -> CliResult<PortScanRequest> {
        let request = if let Some(range) = &self.custom {
            let (start, end) = parse_range(range)?;
            PortScanRequest::custom_range(&self.host, start, end)?
        } else if let Some(list) = &self.ports {
            let spec: PortSpec = list.parse()?;
            PortScanRequest::from_spec(&self.host, &spec)?
        } else {
            PortScanRequest::common(&self.host)?
        };
        Ok(request.with_timeout(Duration::from_secs(
            self.timeout.unwrap_or(default_timeout),
        )))
    }

    /// Execute the scan command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<Completion> {
        let request = self.request(ctx.settings.scan_timeout_secs)?;

        let mut config = ctx.settings.scan_config();
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
        if let Some(rate) = self.rate_limit {
            config.rate_limit = rate;
        }
        if let Some(secs) = self.deadline {
            config.deadline = (secs > 0).then(|| Duration::from_secs(secs));
        }

        let interactive = !ctx.quiet && ctx.format == OutputFormat::Plain;
        config.show_progress = interactive;
        if interactive {
            output::print_scan_header(
                request.host(),
                &request.mode().to_string(),
                request.ports().len(),
            );
        }

        let result = run_scan(&request, &config).await;
        let profile = self.detect.then(|| detect_email_server(&result));

        output::print_report(
            &Report::Scan {
                scan: &result,
                email_server: profile.as_ref(),
            },
            ctx.format,
        )?;

        if result.deadline_exceeded && !ctx.quiet {
            output::print_warning("scan deadline exceeded; unprobed ports are reported closed");
        }
        Ok(Completion::Succeeded)
    }
}

/// Parse `START-END` into raw bounds; range checks happen in the request.
fn parse_range(s: &str) -> Result<(i64, i64), ValidationError> {
    let invalid = || ValidationError::InvalidPortSpec(s.to_string());
    let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse().map_err(|_| invalid())?;
    let end = end.trim().parse().map_err(|_| invalid())?;
    Ok((start, end))
}
