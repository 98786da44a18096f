//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `mailprobe scan <host>` - Scan a host's mail ports
//! - `mailprobe smtp <host>` - SMTP handshake and optional AUTH
//! - `mailprobe imap <host>` - IMAP login and INBOX summary
//! - `mailprobe send <host>` - Submit a test message

mod imap;
mod scan;
mod send;
mod smtp;

pub use imap::ImapCommand;
pub use scan::ScanCommand;
pub use send::SendCommand;
pub use smtp::SmtpCommand;

use crate::config::AppSettings;
use crate::error::{CliResult, ConfigError, ValidationResult};
use crate::outcome::{FailureKind, ProbeOutcome};
use crate::types::ProbeTarget;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

/// mailprobe - Email server connectivity prober.
///
/// Checks which mail ports a host exposes, negotiates SMTP and IMAP
/// sessions with optional TLS and authentication, and can submit a test
/// message.
#[derive(Parser, Debug)]
#[command(name = "mailprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Email server connectivity prober", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verify TLS certificates against the system roots
    #[arg(long = "verify-certs", global = true)]
    pub verify_certs: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a host for open mail ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Probe an SMTP server
    Smtp(SmtpCommand),

    /// Log in to an IMAP server and summarise INBOX
    Imap(ImapCommand),

    /// Send a test email through an SMTP server
    Send(SendCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Settings and global flags resolved for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: AppSettings,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Cli {
    /// Load settings and apply global flag overrides.
    pub fn context(&self) -> CliResult<Context> {
        let mut settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => match AppSettings::load() {
                Err(ConfigError::DirectoryNotFound) => {
                    debug!("no configuration directory, using defaults");
                    AppSettings::default()
                }
                other => other?,
            },
        };

        if self.verify_certs {
            settings.verify_certificates = true;
        }

        let format = match self.output {
            Some(format) => format,
            None => OutputFormat::from_str(&settings.default_output_format, true).map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "default_output_format '{}' must be plain, json or csv",
                    settings.default_output_format
                ))
            })?,
        };

        Ok(Context {
            settings,
            format,
            quiet: self.quiet,
        })
    }

    /// Run the selected subcommand.
    pub async fn execute(&self) -> CliResult<Completion> {
        let ctx = self.context()?;
        match &self.command {
            Commands::Scan(cmd) => cmd.execute(&ctx).await,
            Commands::Smtp(cmd) => cmd.execute(&ctx).await,
            Commands::Imap(cmd) => cmd.execute(&ctx).await,
            Commands::Send(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Server connection arguments shared by the protocol subcommands.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Mail server hostname or IP address
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Server port
    #[arg(short, long)]
    pub port: Option<i64>,

    /// Transport security: none, ssl, tls or starttls
    #[arg(short, long)]
    pub security: Option<String>,

    /// Overall timeout in seconds (5-120)
    #[arg(short = 't', long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Login name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "MAILPROBE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ServerArgs {
    /// Build a validated target, filling gaps from protocol defaults.
    pub fn target(
        &self,
        default_port: i64,
        default_security: &str,
        settings: &AppSettings,
    ) -> ValidationResult<ProbeTarget> {
        ProbeTarget::from_fields(
            &self.host,
            self.port.unwrap_or(default_port),
            self.security.as_deref().unwrap_or(default_security),
            self.timeout.unwrap_or(settings.probe_timeout_secs),
            self.username.as_deref().unwrap_or(""),
            self.password.as_deref().unwrap_or(""),
        )
    }
}

/// How an invocation ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    ProbeFailed,
    InvalidInput,
}

impl Completion {
    pub fn of<D>(outcome: &ProbeOutcome<D>) -> Self {
        match outcome.failure_kind() {
            None => Self::Succeeded,
            Some(FailureKind::InvalidInput) => Self::InvalidInput,
            Some(_) => Self::ProbeFailed,
        }
    }

    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Succeeded => 0,
            Self::ProbeFailed => 1,
            Self::InvalidInput => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_smtp_command() {
        let cli = Cli::try_parse_from([
            "mailprobe", "-vv", "smtp", "mx.example.com", "-p", "465", "-s", "ssl", "-u", "alice",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let Commands::Smtp(cmd) = &cli.command else {
            panic!("expected smtp subcommand");
        };
        let target = cmd
            .server
            .target(587, "tls", &AppSettings::default())
            .unwrap();
        assert_eq!(target.port().as_u16(), 465);
        assert_eq!(target.credentials().map(|c| c.username()), Some("alice"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mailprobe", "scan", "mx.example.com", "-o", "json", "--verify-certs",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert!(cli.verify_certs);
    }

    #[test]
    fn test_context_from_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"default_output_format": "csv"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "mailprobe",
            "--config",
            path.to_str().unwrap(),
            "--verify-certs",
            "imap",
            "imap.example.com",
        ])
        .unwrap();
        let ctx = cli.context().unwrap();
        assert_eq!(ctx.format, OutputFormat::Csv);
        assert!(ctx.settings.verify_certificates);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Completion::Succeeded.exit_code(), 0);
        assert_eq!(Completion::ProbeFailed.exit_code(), 1);
        assert_eq!(Completion::InvalidInput.exit_code(), 2);
    }
}
