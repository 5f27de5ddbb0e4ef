use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use readxkcd::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Rendered output goes to stdout; keep stderr quiet unless asked.
    let default_log = match cli.command {
        Command::BuildCache(_) => "info",
        _ => "warn",
    };
    readxkcd::logging::init(default_log).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    readxkcd::reader::run(cli).await
}
