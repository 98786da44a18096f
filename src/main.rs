use anyhow::Result;
use clap::Parser;
use mailprobe::cli::Cli;
use mailprobe::error::CliError;
use mailprobe::output;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let code = match cli.execute().await {
        Ok(completion) => completion.exit_code(),
        Err(e) => {
            output::print_error(&e.to_string());
            match e {
                CliError::Validation(_) | CliError::Config(_) => 2,
                CliError::Output(_) => 1,
            }
        }
    };

    Ok(ExitCode::from(code))
}
