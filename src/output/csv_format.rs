//! CSV output formatting.
//!
//! Scans produce one row per port. Probe outcomes produce `field,value`
//! rows so every probe kind shares one shape.

use super::Report;
use crate::outcome::ProbeOutcome;
use std::io::{self, Write};

/// Write a report as CSV.
pub fn write_csv<W: Write>(out: &mut W, report: &Report<'_>) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    match report {
        Report::Scan { scan, .. } => {
            wtr.write_record(["port", "open", "service", "banner", "response_ms", "error"])?;
            for result in scan.outcomes() {
                wtr.write_record([
                    &result.port.to_string(),
                    &result.open.to_string(),
                    &result.service,
                    result.banner.as_deref().unwrap_or(""),
                    &result.response_ms.to_string(),
                    result.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
        Report::Smtp(outcome) => {
            let d = &outcome.details;
            let mut rows = common_rows(outcome);
            rows.push(("greeting", d.greeting.clone().unwrap_or_default()));
            rows.push(("tls_active", d.tls_active.to_string()));
            rows.push(("authenticated", d.authenticated.to_string()));
            rows.push(("capabilities", d.capabilities.join(" | ")));
            rows.push(("auth_mechanisms", d.auth_mechanisms.join(" ")));
            rows.push(("max_message_size", opt(d.max_message_size)));
            write_fields(&mut wtr, &rows)?;
        }
        Report::Imap(outcome) => {
            let d = &outcome.details;
            let mut rows = common_rows(outcome);
            rows.push(("total_messages", d.total_messages.to_string()));
            rows.push(("recent_messages", d.recent_messages.to_string()));
            rows.push(("unread_messages", opt(d.unread_messages)));
            rows.push(("mailbox_size_bytes", opt(d.mailbox_size_bytes)));
            rows.push(("quota_used_bytes", opt(d.quota.map(|q| q.used_bytes))));
            rows.push(("quota_limit_bytes", opt(d.quota.map(|q| q.limit_bytes))));
            rows.push(("tls_active", d.tls_active.to_string()));
            rows.push(("capabilities", d.capabilities.join(" ")));
            write_fields(&mut wtr, &rows)?;
        }
        Report::Send(outcome) => {
            let d = &outcome.details;
            let mut rows = common_rows(outcome);
            rows.push(("message_id", d.message_id.clone().unwrap_or_default()));
            rows.push(("queue_id", d.queue_id.clone().unwrap_or_default()));
            rows.push(("accepted_reply", d.accepted_reply.clone().unwrap_or_default()));
            rows.push(("tls_active", d.smtp.tls_active.to_string()));
            rows.push(("authenticated", d.smtp.authenticated.to_string()));
            write_fields(&mut wtr, &rows)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn common_rows<D>(outcome: &ProbeOutcome<D>) -> Vec<(&'static str, String)> {
    vec![
        ("succeeded", outcome.succeeded.to_string()),
        ("message", outcome.message.clone()),
        ("failure_code", outcome.failure_code().unwrap_or("").to_string()),
        ("elapsed_ms", outcome.elapsed_ms.to_string()),
    ]
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_fields<W: Write>(wtr: &mut csv::Writer<W>, rows: &[(&str, String)]) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (field, value) in rows {
        wtr.write_record([*field, value.as_str()])?;
    }
    Ok(())
}
