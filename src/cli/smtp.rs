//! SMTP subcommand implementation.

use crate::cli::{Completion, Context, OutputFormat, ServerArgs};
use crate::error::CliResult;
use crate::output::{self, Report};
use crate::smtp::SmtpProbe;
use clap::Parser;

/// Probe an SMTP server: greeting, EHLO, STARTTLS and optional AUTH.
#[derive(Parser, Debug)]
pub struct SmtpCommand {
    #[command(flatten)]
    pub server: ServerArgs,
}

impl SmtpCommand {
    /// Execute the smtp command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<Completion> {
        let target = self.server.target(587, "tls", &ctx.settings)?;
        let prober = SmtpProbe::new(ctx.settings.probe_options());

        if !ctx.quiet && ctx.format == OutputFormat::Plain {
            output::print_info(&format!("Probing SMTP server {target}"));
        }
        let outcome = prober.probe(&target).await;
        output::print_report(&Report::Smtp(&outcome), ctx.format)?;
        Ok(Completion::of(&outcome))
    }
}
