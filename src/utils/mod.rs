//! Cross-platform utilities
//!
//! # Modules
//!
//! - [`fs`] - Async file system helpers with atomic writes and idempotent directory creation
//! - [`platform`] - Platform-specific names, default directories and permissions
//! - [`progress`] - Terminal progress bar used by the binary

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, remove_file_if_exists};
pub use platform::{is_windows, updater_binary_name};
pub use progress::TerminalProgress;
