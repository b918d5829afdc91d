//! Platform-specific helpers
//!
//! Covers the three places where the update pipeline behaves differently per OS:
//!
//! - the file name of the updater binary on the server and on disk;
//! - marking the downloaded binary executable (Unix only);
//! - the default per-user directories for the roll cache and configuration.
//!
//! Process detachment lives next to the launcher in
//! [`crate::update::handoff`] because it is tied to [`std::process::Command`].

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Application directory name used under the system temp, cache and config roots.
pub const APP_DIR_NAME: &str = "update-trigger";

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// The version-independent name of the updater binary published on the server.
///
/// - **Windows**: `latest-updater.exe`
/// - **Unix-like**: `latest-updater`
#[must_use]
pub const fn updater_binary_name() -> &'static str {
    if is_windows() {
        "latest-updater.exe"
    } else {
        "latest-updater"
    }
}

/// Default directory for downloads: `{system temp}/update-trigger`.
#[must_use]
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR_NAME)
}

/// Default directory for the roll cache.
///
/// Uses the platform cache root (`~/.cache` on Linux, `~/Library/Caches` on macOS,
/// `%LOCALAPPDATA%` on Windows) and falls back to the temp directory when no cache
/// root can be determined.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join(APP_DIR_NAME)
}

/// Default location of the optional TOML configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    let root = dirs::config_dir().context("Could not determine the user configuration directory")?;
    Ok(root.join(APP_DIR_NAME).join("config.toml"))
}

/// Marks a downloaded file as executable.
///
/// On Unix this sets mode `0o755`. On Windows executability comes from the file
/// extension, so this is a no-op.
pub async fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let permissions = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(path, permissions)
            .await
            .with_context(|| format!("Failed to mark {} as executable", path.display()))?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
