//! Command-line entry point.

use std::process::ExitCode;

use clap::Parser;

use caravan_desktop::cli::Cli;
use caravan_desktop::user_message;

#[tokio::main]
async fn main() -> ExitCode {
    caravan_observability::init();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("{}", user_message(&e));
            ExitCode::FAILURE
        }
    }
}
