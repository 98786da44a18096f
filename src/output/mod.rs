//! Output formatting module.
//!
//! Renders scan results and probe outcomes as plain text, JSON or CSV.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_info, print_scan_header, print_success, print_warning, write_plain};

use crate::cli::OutputFormat;
use crate::outcome::{ImapOutcome, SendOutcome, SmtpOutcome};
use crate::scanner::{EmailServerProfile, PortScanResult};
use serde::Serialize;
use std::io::{self, Write};

/// Anything the CLI prints as its final result.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Report<'a> {
    Scan {
        scan: &'a PortScanResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        email_server: Option<&'a EmailServerProfile>,
    },
    Smtp(&'a SmtpOutcome),
    Imap(&'a ImapOutcome),
    Send(&'a SendOutcome),
}

/// Write a report in the given format.
pub fn write_report<W: Write>(out: &mut W, report: &Report<'_>, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_plain(out, report),
        OutputFormat::Json => json_format::write_json(out, report),
        OutputFormat::Csv => csv_format::write_csv(out, report),
    }
}

/// Print a report to stdout.
pub fn print_report(report: &Report<'_>, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, format)
}
