//! SMTP handshake probe.
//!
//! Connect, read the greeting, EHLO, optionally STARTTLS and AUTH, record
//! what the server advertises, then QUIT.

use crate::error::{ProbeError, ProbeResult};
use crate::outcome::{ProbeOutcome, SmtpDetails, SmtpOutcome};
use crate::session::{self, within_deadline, ProbeOptions, Transcript};
use crate::smtp::auth;
use crate::smtp::client::{Capabilities, SmtpClient};
use crate::types::{Credentials, ProbeTarget, SecurityMode};
use crate::validate;
use std::time::Instant;
use tracing::{info, warn};

/// Greeting, EHLO, optional STARTTLS, optional AUTH.
///
/// `details` is filled in as each step completes so failures still report
/// what was learned before them. Traffic is recorded into `transcript`.
pub(crate) async fn handshake(
    target: &ProbeTarget,
    options: &ProbeOptions,
    details: &mut SmtpDetails,
    credentials: Option<&Credentials>,
    transcript: &Transcript,
) -> ProbeResult<SmtpClient> {
    let conn = session::open(target, options.tls)
        .await?
        .with_transcript(transcript.clone());
    let mut client = SmtpClient::new(conn, options.client_identifier.as_str());
    details.tls_active = client.is_tls();

    let greeting = client.greeting().await?;
    details.greeting = Some(greeting.text());

    let mut caps = client.hello().await?;
    record_capabilities(details, &caps, options.capability_limit);

    if target.security() == SecurityMode::StartTls {
        if !caps.has("STARTTLS") {
            return Err(ProbeError::StartTlsUnavailable);
        }
        client = client.starttls(options.tls).await?;
        details.tls_active = true;
        caps = client.hello().await?;
        record_capabilities(details, &caps, options.capability_limit);
    }

    if let Some(creds) = credentials {
        auth::authenticate(&mut client, &caps, creds).await?;
        details.authenticated = true;
    }

    Ok(client)
}

fn record_capabilities(details: &mut SmtpDetails, caps: &Capabilities, limit: usize) {
    details.capabilities = caps.lines().iter().take(limit).cloned().collect();
    details.auth_mechanisms = caps.auth_mechanisms();
    details.max_message_size = caps.max_message_size();
}

/// Probe an SMTP server. Authenticates when the target carries credentials.
pub async fn probe(target: &ProbeTarget, options: &ProbeOptions) -> SmtpOutcome {
    let started = Instant::now();
    for note in validate::smtp_port_advisories(target.port(), target.security()) {
        warn!(target = %target, "{note}");
    }
    info!(target = %target, "starting SMTP probe");

    let mut details = SmtpDetails::default();
    let transcript = Transcript::new();
    let result = within_deadline(target, async {
        let client =
            handshake(target, options, &mut details, target.credentials(), &transcript).await?;
        client.quit().await;
        Ok::<(), ProbeError>(())
    })
    .await;
    details.transcript = transcript.lines();

    match result {
        Ok(()) => {
            let message = if details.authenticated {
                "Authentication successful"
            } else {
                "SMTP connection successful"
            };
            info!(target = %target, "{message}");
            ProbeOutcome::success(started, message, details)
        }
        Err(e) => {
            warn!(target = %target, code = e.kind().as_str(), error = %e, "SMTP probe failed");
            ProbeOutcome::failed(started, "SMTP Error", &e, details)
        }
    }
}
