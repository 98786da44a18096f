//! Send subcommand implementation.

use crate::cli::{Completion, Context, OutputFormat, ServerArgs};
use crate::error::CliResult;
use crate::output::{self, Report};
use crate::smtp::{EmailSendRequest, SmtpProbe};
use clap::Parser;

/// Submit a test email through an SMTP server.
#[derive(Parser, Debug)]
pub struct SendCommand {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Envelope and header sender address
    #[arg(long, value_name = "ADDR")]
    pub from: String,

    /// Recipient address
    #[arg(long, value_name = "ADDR")]
    pub to: String,

    /// Message subject
    #[arg(long, default_value = "mailprobe test message")]
    pub subject: String,

    /// Message body
    #[arg(long, default_value = "This is a test message sent by mailprobe.")]
    pub body: String,

    /// Treat the body as HTML
    #[arg(long)]
    pub html: bool,
}

impl SendCommand {
    /// Execute the send command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<Completion> {
        let target = self.server.target(587, "tls", &ctx.settings)?;
        let request = EmailSendRequest::new(
            target,
            self.from.as_str(),
            self.to.as_str(),
            self.subject.as_str(),
            self.body.as_str(),
            self.html,
        )?;
        let prober = SmtpProbe::new(ctx.settings.probe_options());

        let outcome = prober.send_test_email(&request).await;
        output::print_report(&Report::Send(&outcome), ctx.format)?;

        if outcome.succeeded && !ctx.quiet && ctx.format == OutputFormat::Plain {
            output::print_success(&format!("message accepted for {}", request.to()));
        }
        Ok(Completion::of(&outcome))
    }
}
