//! IMAP subcommand implementation.

use crate::cli::{Completion, Context, OutputFormat, ServerArgs};
use crate::error::CliResult;
use crate::imap::ImapProbe;
use crate::output::{self, Report};
use clap::Parser;

/// Log in to an IMAP server and report on INBOX.
#[derive(Parser, Debug)]
pub struct ImapCommand {
    #[command(flatten)]
    pub server: ServerArgs,
}

impl ImapCommand {
    /// Execute the imap command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<Completion> {
        let target = self.server.target(993, "ssl", &ctx.settings)?;
        let prober = ImapProbe::new(ctx.settings.probe_options());

        if !ctx.quiet && ctx.format == OutputFormat::Plain {
            output::print_info(&format!("Probing IMAP server {target}"));
        }
        let outcome = prober.probe(&target).await;
        output::print_report(&Report::Imap(&outcome), ctx.format)?;
        Ok(Completion::of(&outcome))
    }
}
