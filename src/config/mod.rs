//! Configuration for an update run.
//!
//! Two layers:
//!
//! - [`UpdateRequest`]: the per-launch, immutable input of the pipeline (server root,
//!   current version, paths, wait pids). See [`request`].
//! - [`TriggerConfig`]: optional settings from a TOML file that rarely change between
//!   launches (HTTP client tuning, updater binary name, progress output). See [`global`].

pub mod global;
pub mod request;

pub use global::TriggerConfig;
pub use request::{UpdateRequest, UpdateRequestBuilder};
