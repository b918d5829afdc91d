//! File system helpers used by the roll cache and the downloader.
//!
//! All helpers are async and built on [`tokio::fs`] so they can be awaited from the
//! update pipeline without blocking the runtime.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Ensures a directory exists, creating it and all parents if necessary.
///
/// An already existing directory is not an error. A path that exists but is not a
/// directory is.
///
/// # Examples
///
/// ```rust,no_run
/// use update_trigger::utils::fs::ensure_dir;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// ensure_dir(Path::new("/tmp/update-trigger/rolls")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn ensure_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => {
            let platform_help = if crate::utils::platform::is_windows() {
                "On Windows: Check that the path length is < 260 chars or that long path support is enabled"
            } else {
                "Check directory permissions and path validity"
            };
            return Err(e).with_context(|| {
                format!("Failed to create directory: {}\n\n{}", path.display(), platform_help)
            });
        }
    }

    let metadata = fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
    if !metadata.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// The content goes to a sibling `.tmp` file first, is synced to disk, and is then
/// renamed over the target. Readers never observe a partially written file. Parent
/// directories are created as needed.
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let temp_path = sibling_with_suffix(path, "tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .await
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().await.context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Removes a file, treating "not found" as success.
///
/// Returns `true` when a file was actually removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Returns `path` with `.{suffix}` appended to its full file name.
///
/// Unlike [`Path::with_extension`] this keeps existing extensions, so
/// `latest-updater.exe` becomes `latest-updater.exe.part` rather than
/// `latest-updater.part`, and a semver file name like `1.2.0` keeps its dots.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
