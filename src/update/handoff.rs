//! Handoff to the updater process.
//!
//! The updater is invoked as
//!
//! ```text
//! <updater> --base-url <url> --version <semver> --exec <path> --cwd <path> \
//!           --app-dir <path> --force-temp [-p <pid>]...
//! ```
//!
//! with its working directory set to the temp directory it was downloaded to.
//! Arguments are passed as an argv vector straight to the OS process primitive, so
//! every value arrives as a single token no matter what spaces or quotes it contains.
//! No shell is involved.

use anyhow::Result;
use semver::Version;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::config::UpdateRequest;
use crate::core::TriggerError;

/// A fully built updater invocation. Built fresh each run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffSpec {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: PathBuf,
}

impl HandoffSpec {
    /// Builds the invocation of `updater` for `target`.
    pub fn build(updater: &Path, request: &UpdateRequest, target: &Version) -> Self {
        let mut args: Vec<OsString> = Vec::with_capacity(11 + request.wait_pids().len() * 2);
        let mut flag = |name: &str, value: &OsStr| {
            args.push(name.into());
            args.push(value.to_os_string());
        };

        flag("--base-url", OsStr::new(request.base_url()));
        flag("--version", OsStr::new(&target.to_string()));
        flag("--exec", request.exec_path().as_os_str());
        flag("--cwd", request.cwd().as_os_str());
        flag("--app-dir", request.app_dir().as_os_str());
        args.push("--force-temp".into());

        for pid in request.wait_pids() {
            args.push("-p".into());
            args.push(pid.to_string().into());
        }

        Self {
            program: updater.to_path_buf(),
            args,
            cwd: request.temp_dir().to_path_buf(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Working directory of the updater process.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Renders the invocation as one quoted command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|arg| quote_arg(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A [`Command`] for this invocation with all standard streams detached.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);
        command
    }
}

impl fmt::Display for HandoffSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Quotes an argument for display if it is empty or contains whitespace or quotes.
pub fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // Own process group, so signals aimed at the host's group do not reach it.
    // It still shares the host's session: a new session needs setsid in a pre_exec
    // hook. Signals sent to the whole session reach it.
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Starts the next-stage process.
///
/// Implementations must not wait for the process to exit.
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &HandoffSpec) -> Result<()>;
}

/// The production launcher: spawns the updater detached and forgets about it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl Launcher for DetachedLauncher {
    fn launch(&self, spec: &HandoffSpec) -> Result<()> {
        debug!("Spawning {}", spec);
        let child = spec.to_command().spawn().map_err(|e| TriggerError::SpawnFailed {
            program: spec.program().display().to_string(),
            reason: e.to_string(),
        })?;
        info!("Updater started with pid {}", child.id());
        // Dropping the handle neither waits for nor kills the child
        drop(child);
        Ok(())
    }
}
