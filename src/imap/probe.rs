//! IMAP login probe.
//!
//! Connect, negotiate security, log in, then summarise INBOX: message
//! counts, unread count, size and quota where the server supports them.

use crate::error::{ProbeError, ProbeResult};
use crate::imap::client::ImapClient;
use crate::imap::response::{self, has_capability, has_capability_family};
use crate::outcome::{ImapDetails, ImapOutcome, ProbeOutcome, Quota};
use crate::session::{self, within_deadline, ProbeOptions};
use crate::types::{ProbeTarget, SecurityMode};
use crate::validate;
use std::time::Instant;
use tracing::{debug, info, warn};

/// LOGIN arguments, quoted up front so bad input fails before connecting.
struct QuotedLogin {
    user: String,
    secret: String,
}

async fn run(
    target: &ProbeTarget,
    options: &ProbeOptions,
    login: &QuotedLogin,
    details: &mut ImapDetails,
) -> ProbeResult<()> {
    let conn = session::open(target, options.tls).await?;
    let mut client = ImapClient::new(conn);
    details.tls_active = client.is_tls();

    let greeting = client.greeting().await?;
    let mut caps = match greeting.capabilities {
        Some(caps) => caps,
        None => client.capability().await?,
    };

    if target.security() == SecurityMode::StartTls {
        if !has_capability(&caps, "STARTTLS") {
            return Err(ProbeError::StartTlsUnavailable);
        }
        client = client.starttls(options.tls).await?;
        details.tls_active = true;
        caps = client.capability().await?;
    }
    record_capabilities(details, &caps, options.capability_limit);

    if greeting.preauth {
        debug!(target = %target, "session pre-authenticated, skipping LOGIN");
    } else {
        if has_capability(&caps, "LOGINDISABLED") {
            return Err(ProbeError::AuthUnavailable(
                "server advertises LOGINDISABLED".to_string(),
            ));
        }
        if let Some(updated) = client.login(&login.user, &login.secret).await? {
            caps = updated;
            record_capabilities(details, &caps, options.capability_limit);
        }
    }

    mailbox_summary(&mut client, &caps, details).await?;
    client.logout().await;
    Ok(())
}

fn record_capabilities(details: &mut ImapDetails, caps: &[String], limit: usize) {
    details.capabilities = caps.iter().take(limit).cloned().collect();
}

/// SELECT, STATUS (or SEARCH) and GETQUOTAROOT on INBOX.
async fn mailbox_summary(
    client: &mut ImapClient,
    caps: &[String],
    details: &mut ImapDetails,
) -> ProbeResult<()> {
    let select = client.command("SELECT INBOX").await?;
    if !select.is_ok() {
        return Err(ProbeError::Protocol(format!(
            "SELECT INBOX failed: {}",
            select.text
        )));
    }
    for line in &select.untagged {
        if let Some(n) = response::parse_exists(line) {
            details.total_messages = n;
        } else if let Some(n) = response::parse_recent(line) {
            details.recent_messages = n;
        }
    }

    let with_size = has_capability(caps, "STATUS=SIZE");
    let items = if with_size { "(UNSEEN SIZE)" } else { "(UNSEEN)" };
    let status = client.command(&format!("STATUS INBOX {items}")).await?;
    if let Some(parsed) = status
        .is_ok()
        .then(|| status.untagged.iter().find_map(|l| response::parse_status(l)))
        .flatten()
    {
        details.unread_messages = parsed.unseen;
        details.mailbox_size_bytes = parsed.size;
    }

    if details.unread_messages.is_none() {
        details.unread_messages = client.search_count("UNSEEN").await?;
    }

    if has_capability_family(caps, "QUOTA") {
        let quota = client.command("GETQUOTAROOT INBOX").await?;
        if quota.is_ok() {
            details.quota = quota
                .untagged
                .iter()
                .find_map(|l| response::parse_quota(l))
                .map(|(used, limit)| Quota::from_kilobytes(used, limit));
        } else {
            debug!(reply = %quota.text, "GETQUOTAROOT failed");
        }
    }

    Ok(())
}

fn server_info(details: &ImapDetails) -> String {
    let unseen = details
        .unread_messages
        .map_or_else(|| "unknown".to_string(), |n| n.to_string());
    format!(
        "IMAP Server Connected | Messages: {} | Recent: {} | Unseen: {}",
        details.total_messages, details.recent_messages, unseen
    )
}

/// Log in to an IMAP server and summarise its INBOX.
///
/// The target must carry credentials; without them the probe fails with
/// `invalid-input` before any connection is made.
pub async fn probe(target: &ProbeTarget, options: &ProbeOptions) -> ImapOutcome {
    let started = Instant::now();
    let mut details = ImapDetails::default();

    let login = match quoted_login(target) {
        Ok(login) => login,
        Err(e) => {
            warn!(target = %target, error = %e, "IMAP probe rejected");
            return ProbeOutcome::failed(started, "IMAP Error", &e, details);
        }
    };

    for note in validate::imap_port_advisories(target.port(), target.security()) {
        warn!(target = %target, "{note}");
    }
    info!(target = %target, "starting IMAP probe");

    let result = within_deadline(target, run(target, options, &login, &mut details)).await;

    match result {
        Ok(()) => {
            let summary = server_info(&details);
            info!(target = %target, "{summary}");
            details.server_info = Some(summary);
            ProbeOutcome::success(started, "IMAP connection successful", details)
        }
        Err(e) => {
            warn!(target = %target, code = e.kind().as_str(), error = %e, "IMAP probe failed");
            ProbeOutcome::failed(started, "IMAP Error", &e, details)
        }
    }
}

fn quoted_login(target: &ProbeTarget) -> ProbeResult<QuotedLogin> {
    let creds = target.require_credentials()?;
    Ok(QuotedLogin {
        user: response::quote("username", creds.username())?,
        secret: response::quote("password", creds.secret())?,
    })
}
