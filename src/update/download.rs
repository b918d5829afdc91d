use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::UpdateRequest;
use crate::core::TriggerError;
use crate::update::client::UpdateClient;
use crate::utils::fs::{remove_file_if_exists, sibling_with_suffix};
use crate::utils::platform::make_executable;

/// Bytes received so far against the advertised length, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_so_far: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Completion in percent, or `None` when the total size is unknown.
    pub fn percent(&self) -> Option<u8> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                let percent = self.bytes_so_far.saturating_mul(100) / total;
                // Lossless after the min
                Some(percent.min(100) as u8)
            }
            _ => None,
        }
    }
}

/// Streams the updater binary into the temp directory.
///
/// The body is written to `{name}.part` and renamed to `{name}` only after it has
/// been fully written, flushed and synced. The final path therefore never holds a
/// truncated binary, and a failed download leaves no `.part` file behind.
pub struct Downloader<'a> {
    client: &'a UpdateClient,
    updater_name: &'a str,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a UpdateClient, updater_name: &'a str) -> Self {
        Self {
            client,
            updater_name,
        }
    }

    /// Where the finished binary lands.
    pub fn target_path(&self, request: &UpdateRequest) -> PathBuf {
        request.temp_dir().join(self.updater_name)
    }

    /// Downloads `{base_url}/{updater_name}`.
    ///
    /// `on_progress` receives the completion percentage after every chunk when the
    /// server sends `Content-Length`. Without it, `on_progress` is never called.
    ///
    /// # Errors
    ///
    /// - [`TriggerError::DownloadStatus`] on any status other than `200`
    /// - transport errors, including a body cut short
    /// - file system errors while writing
    pub async fn fetch(
        &self,
        request: &UpdateRequest,
        mut on_progress: impl FnMut(u8),
    ) -> Result<PathBuf> {
        let url = request.url_for(self.updater_name);
        let response = self.client.get(request, self.updater_name).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TriggerError::DownloadStatus {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let target = self.target_path(request);
        let partial = sibling_with_suffix(&target, "part");
        info!("Downloading updater from {} to {}", url, target.display());

        let written = match stream_to_file(response, &partial, &mut on_progress).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&partial).await;
                return Err(e.context(format!("Failed to download updater from {url}")));
            }
        };

        if let Err(e) = install(&partial, &target).await {
            discard_partial(&partial).await;
            return Err(e);
        }

        debug!("Downloaded {} bytes", written);
        Ok(target)
    }
}

/// Marks the finished `.part` file executable and renames it over `target`.
async fn install(partial: &Path, target: &Path) -> Result<()> {
    make_executable(partial).await?;
    fs::rename(partial, target).await.with_context(|| {
        format!("Failed to move {} into place at {}", partial.display(), target.display())
    })
}

async fn discard_partial(partial: &Path) {
    if let Err(e) = remove_file_if_exists(partial).await {
        warn!("Failed to remove partial download: {e:#}");
    }
}

async fn stream_to_file(
    mut response: reqwest::Response,
    path: &Path,
    on_progress: &mut impl FnMut(u8),
) -> Result<u64> {
    let mut file = fs::File::create(path)
        .await
        .context(TriggerError::FileSystem {
            operation: "creating download file".to_string(),
            path: path.display().to_string(),
        })?;

    let mut progress = DownloadProgress {
        bytes_so_far: 0,
        total_bytes: response.content_length(),
    };

    while let Some(chunk) = response.chunk().await.context("Download stream interrupted")? {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        progress.bytes_so_far += chunk.len() as u64;
        if let Some(percent) = progress.percent() {
            on_progress(percent);
        }
    }

    file.flush().await.context("Failed to flush download")?;
    file.sync_all().await.context("Failed to sync download to disk")?;
    Ok(progress.bytes_so_far)
}
