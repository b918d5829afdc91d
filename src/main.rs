//! update-trigger CLI entry point
//!
//! Runs one update check and reports through the exit code whether the calling
//! application should quit. See [`update_trigger::cli`] for the codes.

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use update_trigger::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(true) => ExitCode::from(cli::EXIT_LAUNCHED),
        Ok(false) => ExitCode::from(cli::EXIT_NOT_LAUNCHED),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(cli::EXIT_USAGE)
        }
    }
}
