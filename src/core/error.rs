//! Error handling for update-trigger
//!
//! The pipeline distinguishes three kinds of trouble:
//!
//! - **Soft failures** (version endpoint unreachable, chance lottery lost) are not
//!   errors at all. Stages return `None`/`false` and log a warning.
//! - **Recoverable environment issues** (directory already exists) are absorbed by the
//!   helpers in [`crate::utils::fs`].
//! - **Fatal-for-this-run failures** are represented by [`TriggerError`] and travel as
//!   [`anyhow::Error`] with context until the orchestrator converts them into a failed
//!   [`UpdateOutcome`](crate::update::UpdateOutcome).
//!
//! Stage functions return `anyhow::Result`. Wherever the failure class matters to a
//! caller the typed variant is wrapped so it can be recovered with
//! [`anyhow::Error::downcast_ref`]:
//!
//! ```rust,no_run
//! use update_trigger::core::TriggerError;
//!
//! fn is_server_error(err: &anyhow::Error) -> bool {
//!     matches!(
//!         err.downcast_ref::<TriggerError>(),
//!         Some(TriggerError::DownloadStatus { status, .. }) if *status >= 500
//!     )
//! }
//! ```

use thiserror::Error;

/// The typed failures of an update run.
///
/// # Error Categories
///
/// - **Input**: [`InvalidRequest`], [`Config`]
/// - **Network**: [`DownloadStatus`], [`Network`]
/// - **File System**: [`FileSystem`]
/// - **Process**: [`SpawnFailed`]
///
/// [`InvalidRequest`]: TriggerError::InvalidRequest
/// [`Config`]: TriggerError::Config
/// [`DownloadStatus`]: TriggerError::DownloadStatus
/// [`Network`]: TriggerError::Network
/// [`FileSystem`]: TriggerError::FileSystem
/// [`SpawnFailed`]: TriggerError::SpawnFailed
#[derive(Error, Debug)]
pub enum TriggerError {
    /// The update request could not be built
    ///
    /// Raised by [`UpdateRequestBuilder::build`](crate::config::UpdateRequestBuilder::build)
    /// when a required field is missing or malformed.
    #[error("Invalid update request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request
        reason: String,
    },

    /// The updater binary endpoint answered with a non-success status
    #[error("Updater download from {url} failed with HTTP {status}")]
    DownloadStatus {
        /// The URL that was requested
        url: String,
        /// The HTTP status code returned by the server
        status: u16,
    },

    /// Network error
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// The network operation that failed
        operation: String,
        /// Reason for the network failure
        reason: String,
    },

    /// File system error
    #[error("File system error: {operation} ({path})")]
    FileSystem {
        /// The file system operation that failed
        operation: String,
        /// Path where the file system error occurred
        path: String,
    },

    /// The updater process could not be started
    ///
    /// # Fields
    /// - `program`: The executable that was launched
    /// - `reason`: The OS error reported by the spawn call
    #[error("Failed to launch updater {program}: {reason}")]
    SpawnFailed {
        /// Path of the executable
        program: String,
        /// The OS error message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },
}

impl TriggerError {
    /// Shorthand for an [`InvalidRequest`](TriggerError::InvalidRequest) error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}
