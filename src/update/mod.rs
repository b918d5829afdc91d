//! The update pipeline.
//!
//! A host application calls into this module once, typically at startup, to find
//! out whether it should hand itself over to a separately shipped updater. If so,
//! the updater binary is downloaded and started detached, and the host exits.
//!
//! # Components
//!
//! - **[`VersionResolver`]**: reads `{base_url}/version.json` and compares it with the
//!   running version
//! - **[`RolloutGate`]**: reads `{base_url}/{version}.chance` and compares the
//!   published percentage with this installation's persisted roll
//! - **[`RollCache`]**: stores one roll per target version under the cache directory
//! - **[`Downloader`]**: streams `{base_url}/latest-updater` into the temp directory
//! - **[`HandoffSpec`]** and **[`Launcher`]**: build and start the updater invocation
//! - **[`UpdateTrigger`]**: runs the stages in order and contains every failure
//!
//! # Flow
//!
//! ```text
//! 1. Resolve   version.json newer than current?       no  -> NoUpdate
//! 2. Gate      roll <= chance (or no chance file)?    no  -> Skipped
//! 3. Download  latest-updater into temp dir           err -> Failed
//! 4. Launch    spawn detached with -p <pid>...        err -> Failed
//!                                                      ok  -> Launched
//! ```
//!
//! Only `Launched` makes [`UpdateTrigger::run`] return `true`. Progress is reported to
//! a [`ProgressSink`] between a positive gate decision and the end of the run.

pub mod client;
pub mod download;
pub mod handoff;
pub mod progress;
pub mod roll_cache;
pub mod rollout;
pub mod trigger;
pub mod version_check;

pub use client::UpdateClient;
pub use download::{DownloadProgress, Downloader};
pub use handoff::{DetachedLauncher, HandoffSpec, Launcher};
pub use progress::{NoopProgress, ProgressSession, ProgressSink};
pub use roll_cache::RollCache;
pub use rollout::{ChanceDescriptor, RolloutGate};
pub use trigger::{Stage, UpdateOutcome, UpdateTrigger, check_and_launch};
pub use version_check::{VersionDescriptor, VersionResolver};
