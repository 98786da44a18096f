//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::Report;
use crate::outcome::{ImapOutcome, ProbeOutcome, SendOutcome, SmtpOutcome};
use crate::scanner::{EmailServerProfile, PortScanResult};
use console::{style, Style};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write a report in human-readable plain text.
pub fn write_plain<W: Write>(out: &mut W, report: &Report<'_>) -> io::Result<()> {
    match report {
        Report::Scan { scan, email_server } => write_scan(out, scan, *email_server),
        Report::Smtp(outcome) => write_smtp(out, outcome),
        Report::Imap(outcome) => write_imap(out, outcome),
        Report::Send(outcome) => write_send(out, outcome),
    }
}

fn write_title<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                {} {}",
        style("mailprobe").cyan().bold(),
        title
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

fn write_footer<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)
}

fn write_scan<W: Write>(
    out: &mut W,
    scan: &PortScanResult,
    email_server: Option<&EmailServerProfile>,
) -> io::Result<()> {
    write_title(out, "Port Scan Results")?;

    writeln!(out, "  {} {}", style("Target:").bold(), scan.host)?;
    writeln!(out, "  {} {}", style("Mode:").bold(), scan.mode)?;
    writeln!(out)?;

    let open = scan.open_ports().len();
    writeln!(
        out,
        "  {} {} ports scanned in {:.2}s",
        style("Statistics:").bold(),
        scan.per_port.len(),
        scan.total_elapsed_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "               {} open, {} closed",
        style(open).green().bold(),
        style(scan.per_port.len() - open).red()
    )?;
    if scan.deadline_exceeded {
        writeln!(
            out,
            "               {}",
            style("scan deadline exceeded, some ports were not probed").yellow()
        )?;
    }
    writeln!(out)?;

    writeln!(out, "  {}", style(THIN_RULE).dim())?;
    writeln!(
        out,
        "  {:>6}  {:^8}  {:<18}  {}",
        style("PORT").bold(),
        style("STATE").bold(),
        style("SERVICE").bold(),
        style("BANNER").bold()
    )?;
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    for result in scan.outcomes() {
        let (state, state_style) = if result.open {
            ("open", Style::new().green().bold())
        } else {
            ("closed", Style::new().red())
        };
        let detail = result
            .banner
            .as_deref()
            .or(result.error.as_deref())
            .map(|s| truncate_string(s, 35))
            .unwrap_or_default();

        writeln!(
            out,
            "  {:>6}  {:^8}  {:<18}  {}",
            result.port,
            state_style.apply_to(state),
            result.service,
            style(detail).dim()
        )?;
    }
    writeln!(out, "  {}", style(THIN_RULE).dim())?;

    if let Some(profile) = email_server {
        write_profile(out, profile)?;
    }

    write_footer(out)
}

fn write_profile<W: Write>(out: &mut W, profile: &EmailServerProfile) -> io::Result<()> {
    writeln!(out)?;
    if !profile.is_email_server() {
        writeln!(out, "  {}", style("No mail service ports are open.").dim())?;
        return Ok(());
    }

    writeln!(out, "  {}", style("Email server detected").green().bold())?;
    if let Some(software) = &profile.server_software {
        writeln!(out, "  {} {}", style("Software:").bold(), software)?;
    }

    for (label, endpoints) in [
        ("SMTP:", &profile.smtp_ports),
        ("IMAP:", &profile.imap_ports),
        ("POP3:", &profile.pop3_ports),
    ] {
        if endpoints.is_empty() {
            continue;
        }
        let ports: Vec<String> = endpoints
            .iter()
            .map(|e| format!("{} ({})", e.port, e.security))
            .collect();
        writeln!(out, "  {:<9} {}", style(label).bold(), ports.join(", "))?;
    }

    for note in &profile.recommendations {
        writeln!(out, "  {} {}", style("•").yellow(), note)?;
    }
    Ok(())
}

fn write_status<W: Write, D>(out: &mut W, outcome: &ProbeOutcome<D>) -> io::Result<()> {
    if outcome.succeeded {
        writeln!(out, "  {} {}", style("✓").green().bold(), outcome.message)?;
    } else {
        writeln!(out, "  {} {}", style("✗").red().bold(), outcome.message)?;
    }
    if let Some(failure) = &outcome.failure {
        writeln!(
            out,
            "  {} {} ({:?})",
            style("Failure:").bold(),
            style(failure.kind).red(),
            failure.category
        )?;
    }
    writeln!(out, "  {} {} ms", style("Elapsed:").bold(), outcome.elapsed_ms)?;
    writeln!(out)
}

fn write_list<W: Write>(out: &mut W, label: &str, items: &[String]) -> io::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {}", style(label).bold())?;
    for item in items {
        writeln!(out, "    {} {}", style("•").dim(), item)?;
    }
    Ok(())
}

fn write_smtp<W: Write>(out: &mut W, outcome: &SmtpOutcome) -> io::Result<()> {
    write_title(out, "SMTP Probe")?;
    write_status(out, outcome)?;

    let d = &outcome.details;
    if let Some(greeting) = &d.greeting {
        writeln!(out, "  {} {}", style("Greeting:").bold(), greeting)?;
    }
    writeln!(out, "  {} {}", style("TLS:").bold(), yes_no(d.tls_active))?;
    writeln!(out, "  {} {}", style("Authenticated:").bold(), yes_no(d.authenticated))?;
    if !d.auth_mechanisms.is_empty() {
        writeln!(out, "  {} {}", style("AUTH:").bold(), d.auth_mechanisms.join(" "))?;
    }
    if let Some(size) = d.max_message_size {
        writeln!(out, "  {} {} bytes", style("Max size:").bold(), size)?;
    }
    write_list(out, "Capabilities:", &d.capabilities)?;
    write_transcript(out, outcome.succeeded, &d.transcript)?;

    write_footer(out)
}

/// The wire conversation, shown only when something went wrong.
fn write_transcript<W: Write>(out: &mut W, succeeded: bool, lines: &[String]) -> io::Result<()> {
    if succeeded || lines.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {}", style("Conversation:").bold())?;
    for line in lines {
        writeln!(out, "    {}", style(line).dim())?;
    }
    Ok(())
}

fn write_imap<W: Write>(out: &mut W, outcome: &ImapOutcome) -> io::Result<()> {
    write_title(out, "IMAP Probe")?;
    write_status(out, outcome)?;

    let d = &outcome.details;
    if let Some(info) = &d.server_info {
        writeln!(out, "  {}", style(info).dim())?;
    }
    writeln!(out, "  {} {}", style("TLS:").bold(), yes_no(d.tls_active))?;
    if outcome.succeeded {
        writeln!(out, "  {} {}", style("Messages:").bold(), d.total_messages)?;
        writeln!(out, "  {} {}", style("Recent:").bold(), d.recent_messages)?;
        if let Some(unread) = d.unread_messages {
            writeln!(out, "  {} {}", style("Unread:").bold(), unread)?;
        }
        if let Some(size) = d.mailbox_size_bytes {
            writeln!(out, "  {} {} bytes", style("Mailbox size:").bold(), size)?;
        }
        if let Some(quota) = d.quota {
            writeln!(
                out,
                "  {} {} / {} bytes ({:.2}%)",
                style("Quota:").bold(),
                quota.used_bytes,
                quota.limit_bytes,
                quota.usage_percent
            )?;
        }
    }
    write_list(out, "Capabilities:", &d.capabilities)?;

    write_footer(out)
}

fn write_send<W: Write>(out: &mut W, outcome: &SendOutcome) -> io::Result<()> {
    write_title(out, "Test Email")?;
    write_status(out, outcome)?;

    let d = &outcome.details;
    if let Some(id) = &d.message_id {
        writeln!(out, "  {} {}", style("Message-ID:").bold(), id)?;
    }
    if let Some(id) = &d.queue_id {
        writeln!(out, "  {} {}", style("Queue ID:").bold(), id)?;
    }
    if let Some(reply) = &d.accepted_reply {
        writeln!(out, "  {} {}", style("Server reply:").bold(), reply)?;
    }
    writeln!(out, "  {} {}", style("TLS:").bold(), yes_no(d.smtp.tls_active))?;
    write_transcript(out, outcome.succeeded, &d.smtp.transcript)?;

    write_footer(out)
}

fn yes_no(value: bool) -> console::StyledObject<&'static str> {
    if value {
        style("yes").green()
    } else {
        style("no").yellow()
    }
}

/// Print a banner before a scan starts.
pub fn print_scan_header(host: &str, mode: &str, ports: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("mailprobe").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} Mode: {}", style("•").dim(), style(mode).yellow());
    println!("{} Target: {}", style("•").dim(), style(host).white().bold());
    println!(
        "{} Scanning {} ports...",
        style("•").dim(),
        style(ports).white().bold()
    );
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
