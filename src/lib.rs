//! update-trigger - the front end of a desktop application's self-update.
//!
//! A host application calls in once, usually at startup. If the update server
//! publishes a newer version and this installation is part of the current staged
//! rollout, the separately shipped updater binary is downloaded and started as a
//! detached process, and the host is told to exit so its files can be replaced.
//!
//! # Architecture Overview
//!
//! ```text
//! UpdateRequest ──► VersionResolver ──► RolloutGate ──► Downloader ──► Launcher
//!                   version.json        {v}.chance      latest-updater  detached
//!                                       + RollCache     + ProgressSink  spawn
//! ```
//!
//! The stages run strictly in sequence inside [`update::UpdateTrigger`], which turns
//! every failure into a logged, non-launched outcome. The caller only ever sees a
//! `bool`.
//!
//! # Core Modules
//!
//! - [`config`] - The per-run [`config::UpdateRequest`] and the optional TOML file
//! - [`core`] - The typed error taxonomy
//! - [`update`] - The pipeline stages and the orchestrator
//! - [`utils`] - File system, platform and terminal progress helpers
//! - [`cli`] - The `update-trigger` command
//!
//! # Example
//!
//! ```rust,no_run
//! use update_trigger::config::UpdateRequest;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let request = UpdateRequest::builder()
//!     .base_url("https://updates.example.com/app")
//!     .current_version(env!("CARGO_PKG_VERSION"))
//!     .exec_path(std::env::current_exe()?)
//!     .wait_pid(std::process::id())
//!     .build()?;
//!
//! if update_trigger::check_and_launch(request).await {
//!     // The updater is running and waits for this process to exit
//!     std::process::exit(0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{TriggerConfig, UpdateRequest};
pub use core::TriggerError;
pub use update::{UpdateOutcome, UpdateTrigger, check_and_launch};
