//! The immutable input of one update run.

use crate::core::TriggerError;
use crate::update::version_check::parse_version;
use crate::utils::platform;
use semver::Version;
use std::path::{Path, PathBuf};

/// Default name of the remote version descriptor file.
pub const DEFAULT_VERSION_FILE: &str = "version.json";

/// Everything the pipeline needs to know about this installation.
///
/// Built once through [`UpdateRequest::builder`], then shared by reference with every
/// stage. There are no setters: a request cannot change during a run.
///
/// # Examples
///
/// ```rust,no_run
/// use update_trigger::config::UpdateRequest;
///
/// # fn example() -> anyhow::Result<()> {
/// let request = UpdateRequest::builder()
///     .base_url("https://updates.example.com/app")
///     .current_version("1.4.2")
///     .exec_path("/opt/app/app")
///     .wait_pid(std::process::id())
///     .build()?;
///
/// assert_eq!(request.url_for("version.json"), "https://updates.example.com/app/version.json");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    base_url: String,
    current_version: Version,
    version_file_name: String,
    temp_dir: PathBuf,
    cache_dir: PathBuf,
    exec_path: PathBuf,
    cwd: PathBuf,
    app_dir: PathBuf,
    wait_pids: Vec<u32>,
}

impl UpdateRequest {
    /// Starts building a request.
    pub fn builder() -> UpdateRequestBuilder {
        UpdateRequestBuilder::default()
    }

    /// The update server root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The version of the running application.
    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Name of the version descriptor file under [`base_url`](Self::base_url).
    pub fn version_file_name(&self) -> &str {
        &self.version_file_name
    }

    /// Directory the updater binary is downloaded to and run from.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Directory holding the roll cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the host application executable.
    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    /// Working directory the host application was started in.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Installation directory of the host application.
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Processes the updater must wait for before replacing files, in order.
    pub fn wait_pids(&self) -> &[u32] {
        &self.wait_pids
    }

    /// Joins a file name onto the server root: `{base_url}/{name}`.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }
}

/// Builder for [`UpdateRequest`].
///
/// Required: `base_url`, `current_version`, `exec_path`.
///
/// Defaults:
/// - `version_file_name`: `version.json`
/// - `temp_dir`: `{system temp}/update-trigger`
/// - `cache_dir`: `{user cache}/update-trigger`
/// - `cwd`: the current directory of this process
/// - `app_dir`: the parent directory of `exec_path`
#[derive(Debug, Default, Clone)]
pub struct UpdateRequestBuilder {
    base_url: Option<String>,
    current_version: Option<String>,
    version_file_name: Option<String>,
    temp_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    exec_path: Option<PathBuf>,
    cwd: Option<PathBuf>,
    app_dir: Option<PathBuf>,
    wait_pids: Vec<u32>,
}

impl UpdateRequestBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = Some(version.into());
        self
    }

    pub fn version_file_name(mut self, name: impl Into<String>) -> Self {
        self.version_file_name = Some(name.into());
        self
    }

    pub fn temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(path.into());
        self
    }

    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn exec_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exec_path = Some(path.into());
        self
    }

    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    pub fn app_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.app_dir = Some(path.into());
        self
    }

    /// Appends one process id to wait for.
    pub fn wait_pid(mut self, pid: u32) -> Self {
        self.wait_pids.push(pid);
        self
    }

    /// Appends several process ids, preserving their order.
    pub fn wait_pids(mut self, pids: impl IntoIterator<Item = u32>) -> Self {
        self.wait_pids.extend(pids);
        self
    }

    /// Validates the collected fields and produces the request.
    pub fn build(self) -> Result<UpdateRequest, TriggerError> {
        let base_url = self
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| TriggerError::invalid_request("base_url is required"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TriggerError::invalid_request(format!(
                "base_url must be an http(s) URL, got '{base_url}'"
            )));
        }

        let raw_version = self
            .current_version
            .ok_or_else(|| TriggerError::invalid_request("current_version is required"))?;
        let current_version = parse_version(&raw_version).map_err(|e| {
            TriggerError::invalid_request(format!(
                "current_version '{raw_version}' is not a semantic version: {e}"
            ))
        })?;

        let version_file_name = self
            .version_file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION_FILE.to_string());

        let exec_path = self
            .exec_path
            .ok_or_else(|| TriggerError::invalid_request("exec_path is required"))?;

        let app_dir = match self.app_dir {
            Some(dir) => dir,
            None => exec_path.parent().map(Path::to_path_buf).ok_or_else(|| {
                TriggerError::invalid_request(format!(
                    "app_dir not given and {} has no parent directory",
                    exec_path.display()
                ))
            })?,
        };

        let cwd = match self.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir().map_err(|e| {
                TriggerError::invalid_request(format!("cannot determine current directory: {e}"))
            })?,
        };

        Ok(UpdateRequest {
            base_url,
            current_version,
            version_file_name,
            temp_dir: self.temp_dir.unwrap_or_else(platform::default_temp_dir),
            cache_dir: self.cache_dir.unwrap_or_else(platform::default_cache_dir),
            exec_path,
            cwd,
            app_dir,
            wait_pids: self.wait_pids,
        })
    }
}
