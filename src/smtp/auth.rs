//! SMTP authentication: PLAIN preferred, LOGIN as fallback.

use crate::error::{ProbeError, ProbeResult, ValidationError};
use crate::smtp::client::{Capabilities, SmtpClient};
use crate::types::Credentials;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

/// SASL mechanisms this probe can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    Plain,
    Login,
}

/// Pick the mechanism to use from the advertised list.
pub fn select_mechanism(caps: &Capabilities) -> ProbeResult<AuthMechanism> {
    let advertised = caps.auth_mechanisms();
    if advertised.is_empty() {
        return Err(ProbeError::AuthUnavailable(
            "server does not advertise AUTH".to_string(),
        ));
    }
    if caps.supports_auth("PLAIN") {
        Ok(AuthMechanism::Plain)
    } else if caps.supports_auth("LOGIN") {
        Ok(AuthMechanism::Login)
    } else {
        Err(ProbeError::AuthUnavailable(format!(
            "no supported mechanism among {}",
            advertised.join(", ")
        )))
    }
}

/// Authenticate with the best available mechanism.
pub async fn authenticate(
    client: &mut SmtpClient,
    caps: &Capabilities,
    creds: &Credentials,
) -> ProbeResult<()> {
    if creds.username().contains('\0') || creds.secret().contains('\0') {
        return Err(ValidationError::UnsendableCredential("credentials").into());
    }

    let mechanism = select_mechanism(caps)?;
    debug!(?mechanism, "authenticating");

    match mechanism {
        AuthMechanism::Plain => auth_plain(client, creds).await,
        AuthMechanism::Login => auth_login(client, creds).await,
    }
}

/// `\0username\0password`, base64-encoded.
pub fn plain_payload(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

async fn auth_plain(client: &mut SmtpClient, creds: &Credentials) -> ProbeResult<()> {
    let payload = plain_payload(creds.username(), creds.secret());
    let reply = client
        .secret_command(&format!("AUTH PLAIN {payload}"), "AUTH PLAIN <redacted>")
        .await?;

    if reply.code == 235 {
        Ok(())
    } else {
        Err(ProbeError::AuthFailed(reply.to_string()))
    }
}

async fn auth_login(client: &mut SmtpClient, creds: &Credentials) -> ProbeResult<()> {
    let reply = client.command("AUTH LOGIN").await?;
    if reply.code != 334 {
        return Err(ProbeError::AuthFailed(reply.to_string()));
    }

    let user = STANDARD.encode(creds.username());
    let reply = client.secret_command(&user, "<redacted username>").await?;
    if reply.code != 334 {
        return Err(ProbeError::AuthFailed(reply.to_string()));
    }

    let pass = STANDARD.encode(creds.secret());
    let reply = client.secret_command(&pass, "<redacted password>").await?;
    if reply.code == 235 {
        Ok(())
    } else {
        Err(ProbeError::AuthFailed(reply.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::reply::Reply;

    fn caps(lines: &[&str]) -> Capabilities {
        let mut all = vec!["mx".to_string()];
        all.extend(lines.iter().map(|s| s.to_string()));
        Capabilities::from_ehlo(&Reply {
            code: 250,
            lines: all,
        })
    }

    #[test]
    fn test_plain_payload_format() {
        let decoded = STANDARD.decode(plain_payload("user", "pass")).unwrap();
        assert_eq!(decoded, b"\0user\0pass");
    }

    #[test]
    fn test_select_prefers_plain() {
        assert_eq!(
            select_mechanism(&caps(&["AUTH LOGIN PLAIN"])).unwrap(),
            AuthMechanism::Plain
        );
        assert_eq!(
            select_mechanism(&caps(&["AUTH LOGIN CRAM-MD5"])).unwrap(),
            AuthMechanism::Login
        );
    }

    #[test]
    fn test_select_without_auth() {
        assert!(matches!(
            select_mechanism(&caps(&["PIPELINING"])),
            Err(ProbeError::AuthUnavailable(_))
        ));
        assert!(matches!(
            select_mechanism(&caps(&["AUTH XOAUTH2"])),
            Err(ProbeError::AuthUnavailable(_))
        ));
    }
}
