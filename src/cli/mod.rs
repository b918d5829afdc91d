//! Command-line interface for update-trigger.
//!
//! The binary runs one update check for a host application and tells the host, via
//! its exit code, whether to quit so the updater can replace it.
//!
//! # Exit Codes
//!
//! | code | meaning |
//! |------|---------|
//! | `0` | an updater was launched, the host should exit |
//! | `1` | no updater was launched |
//! | `2` | invalid arguments or configuration |
//!
//! # Examples
//!
//! ```bash
//! # Minimal invocation
//! update-trigger --base-url https://updates.example.com/app \
//!     --current-version 1.4.2 --exec /opt/app/app --wait-pid 4242
//!
//! # Everything from the environment, no progress bar
//! UPDATE_TRIGGER_BASE_URL=https://updates.example.com/app \
//! UPDATE_TRIGGER_CURRENT_VERSION=1.4.2 \
//! UPDATE_TRIGGER_EXEC=/opt/app/app \
//! update-trigger --no-progress
//! ```

use anyhow::Result;
use clap::Parser;
use clap::builder::BoolishValueParser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::{TriggerConfig, UpdateRequest};
use crate::core::TriggerError;
use crate::update::{Stage, UpdateOutcome, UpdateTrigger};
use crate::utils::progress::{TerminalProgress, is_progress_disabled};

/// Exit code when an updater was launched.
pub const EXIT_LAUNCHED: u8 = 0;
/// Exit code when no updater was launched.
pub const EXIT_NOT_LAUNCHED: u8 = 1;
/// Exit code for invalid arguments or configuration.
pub const EXIT_USAGE: u8 = 2;

/// Check for an application update and hand off to the updater.
#[derive(Parser, Debug)]
#[command(
    name = "update-trigger",
    about = "Check for an application update and hand off to the updater",
    version,
    long_about = "Checks the update server for a newer version, honors staged rollouts, \
                  downloads the updater and starts it detached. Exits 0 if the updater \
                  was started and the calling application should quit."
)]
pub struct Cli {
    /// Root URL of the update server
    #[arg(long, env = "UPDATE_TRIGGER_BASE_URL")]
    base_url: Option<String>,

    /// Version of the running application
    #[arg(long, env = "UPDATE_TRIGGER_CURRENT_VERSION")]
    current_version: String,

    /// Name of the version descriptor on the server
    #[arg(long, env = "UPDATE_TRIGGER_VERSION_FILE")]
    version_file: Option<String>,

    /// Directory the updater is downloaded to
    #[arg(long, env = "UPDATE_TRIGGER_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Directory holding persisted rollout rolls
    #[arg(long, env = "UPDATE_TRIGGER_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Path of the application executable to update
    #[arg(long = "exec", env = "UPDATE_TRIGGER_EXEC")]
    exec_path: PathBuf,

    /// Working directory to restart the application in
    #[arg(long, env = "UPDATE_TRIGGER_CWD")]
    cwd: Option<PathBuf>,

    /// Installation root of the application
    #[arg(long, env = "UPDATE_TRIGGER_APP_DIR")]
    app_dir: Option<PathBuf>,

    /// Process the updater waits for before replacing files (repeatable)
    #[arg(long = "wait-pid", env = "UPDATE_TRIGGER_WAIT_PID", value_delimiter = ',')]
    wait_pids: Vec<u32>,

    /// Path to a TOML configuration file [default: UPDATE_TRIGGER_CONFIG, then the
    /// user config directory]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the download progress bar (also UPDATE_TRIGGER_NO_PROGRESS)
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(
        short,
        long,
        env = "UPDATE_TRIGGER_VERBOSE",
        value_parser = BoolishValueParser::new(),
        conflicts_with = "quiet"
    )]
    verbose: bool,

    /// Only log errors and print nothing on success
    #[arg(short, long, env = "UPDATE_TRIGGER_QUIET", value_parser = BoolishValueParser::new())]
    quiet: bool,
}

impl Cli {
    /// Runs one update check.
    ///
    /// Returns whether an updater was launched. Errors are reserved for invalid
    /// arguments and configuration. Everything that goes wrong while setting up or
    /// running the check itself is reported as `Ok(false)`.
    pub async fn execute(self) -> Result<bool> {
        self.init_logging();

        let config = TriggerConfig::load_with_optional(self.config.clone()).await?;
        let show_progress = config.show_progress && !self.no_progress && !is_progress_disabled();
        let quiet = self.quiet;
        let request = self.into_request(&config)?;

        let progress = if show_progress {
            TerminalProgress::new()
        } else {
            TerminalProgress::hidden()
        };

        // A client that cannot be built is an environment problem, not a usage error
        let outcome = match UpdateTrigger::new(request, &config) {
            Ok(trigger) => {
                let mut trigger = trigger.progress(progress);
                trigger.execute().await
            }
            Err(e) => {
                warn!("Update check unavailable: {e:#}");
                UpdateOutcome::Failed {
                    stage: Stage::Resolve,
                    reason: format!("{e:#}"),
                }
            }
        };

        if !quiet {
            print_outcome(&outcome);
        }
        Ok(outcome.launched())
    }

    /// The log filter: `RUST_LOG` if set, otherwise derived from `-v`/`-q`.
    fn log_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        EnvFilter::new(format!("update_trigger={level}"))
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Merges arguments over the config file into an [`UpdateRequest`].
    fn into_request(self, config: &TriggerConfig) -> Result<UpdateRequest, TriggerError> {
        let base_url = self.base_url.or_else(|| config.base_url.clone()).ok_or_else(|| {
            TriggerError::invalid_request(
                "no base URL given; pass --base-url or set base_url in the config file",
            )
        })?;

        let mut builder = UpdateRequest::builder()
            .base_url(base_url)
            .current_version(self.current_version)
            .exec_path(self.exec_path)
            .wait_pids(self.wait_pids);

        if let Some(name) = self.version_file.or_else(|| config.version_file.clone()) {
            builder = builder.version_file_name(name);
        }
        if let Some(dir) = self.temp_dir {
            builder = builder.temp_dir(dir);
        }
        if let Some(dir) = self.cache_dir {
            builder = builder.cache_dir(dir);
        }
        if let Some(dir) = self.cwd {
            builder = builder.cwd(dir);
        }
        if let Some(dir) = self.app_dir {
            builder = builder.app_dir(dir);
        }

        builder.build()
    }
}

fn print_outcome(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::NoUpdate => println!("{}", "No update available".dimmed()),
        UpdateOutcome::Skipped { version } => {
            println!("{} {} is rolling out, not this time", "Update".yellow(), version);
        }
        UpdateOutcome::Failed { stage, reason } => {
            eprintln!("{} update {} failed: {}", "warning:".yellow().bold(), stage, reason);
        }
        UpdateOutcome::Launched { version, updater } => {
            println!(
                "{} updater for {} ({})",
                "Launched".green().bold(),
                version.to_string().bold(),
                updater.display()
            );
        }
    }
}
