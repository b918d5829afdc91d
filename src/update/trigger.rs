use anyhow::Result;
use futures::FutureExt;
use semver::Version;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::{TriggerConfig, UpdateRequest};
use crate::update::client::UpdateClient;
use crate::update::download::Downloader;
use crate::update::handoff::{DetachedLauncher, HandoffSpec, Launcher};
use crate::update::progress::{NoopProgress, ProgressSession, ProgressSink};
use crate::update::rollout::RolloutGate;
use crate::update::version_check::VersionResolver;
use crate::utils::fs::ensure_dir;

/// The pipeline stage a run was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Gate,
    Download,
    Launch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolve => "resolve",
            Stage::Gate => "gate",
            Stage::Download => "download",
            Stage::Launch => "launch",
        })
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No newer version, or the version endpoint could not be read.
    NoUpdate,
    /// A newer version exists but this installation is not in this cycle's rollout.
    Skipped { version: Version },
    /// A stage failed; nothing was launched.
    Failed { stage: Stage, reason: String },
    /// The updater was started and the host should exit.
    Launched { version: Version, updater: PathBuf },
}

impl UpdateOutcome {
    /// `true` only when an updater process was started.
    pub fn launched(&self) -> bool {
        matches!(self, UpdateOutcome::Launched { .. })
    }
}

/// Sequences version check, rollout gate, download and handoff.
///
/// `UpdateTrigger` owns failure containment: [`run`](Self::run) and
/// [`execute`](Self::execute) never return an error and never panic. Every failure is
/// logged once and turned into a non-launched [`UpdateOutcome`].
///
/// # Examples
///
/// ```rust,no_run
/// use update_trigger::config::{TriggerConfig, UpdateRequest};
/// use update_trigger::update::UpdateTrigger;
///
/// # async fn example() -> anyhow::Result<()> {
/// let request = UpdateRequest::builder()
///     .base_url("https://updates.example.com/app")
///     .current_version(env!("CARGO_PKG_VERSION"))
///     .exec_path(std::env::current_exe()?)
///     .wait_pid(std::process::id())
///     .build()?;
///
/// if UpdateTrigger::new(request, &TriggerConfig::default())?.run().await {
///     std::process::exit(0);
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpdateTrigger {
    request: UpdateRequest,
    client: UpdateClient,
    updater_name: String,
    progress: Box<dyn ProgressSink>,
    launcher: Box<dyn Launcher>,
    stage: Stage,
}

impl UpdateTrigger {
    /// Creates a trigger with a fresh HTTP client, no progress output and the
    /// detached launcher.
    pub fn new(request: UpdateRequest, config: &TriggerConfig) -> Result<Self> {
        let client = UpdateClient::new(config)?;
        Ok(Self::with_client(request, client, config.updater_name()))
    }

    /// Creates a trigger around an existing client.
    pub fn with_client(request: UpdateRequest, client: UpdateClient, updater_name: &str) -> Self {
        Self {
            request,
            client,
            updater_name: updater_name.to_string(),
            progress: Box::new(NoopProgress),
            launcher: Box::new(DetachedLauncher),
            stage: Stage::Resolve,
        }
    }

    /// Replaces the progress sink.
    pub fn progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// Replaces the launcher.
    pub fn launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn request(&self) -> &UpdateRequest {
        &self.request
    }

    /// Runs the pipeline and reports whether an updater was launched.
    pub async fn run(mut self) -> bool {
        self.execute().await.launched()
    }

    /// Runs the pipeline and reports how it ended.
    pub async fn execute(&mut self) -> UpdateOutcome {
        let result = AssertUnwindSafe(self.pipeline()).catch_unwind().await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Update pipeline panicked in {} stage: {}", self.stage, reason);
                UpdateOutcome::Failed {
                    stage: self.stage,
                    reason,
                }
            }
        };
        debug!("Update run finished: {:?}", outcome);
        outcome
    }

    async fn pipeline(&mut self) -> UpdateOutcome {
        self.stage = Stage::Resolve;
        let request = &self.request;

        let target = match VersionResolver::new(&self.client).newer_version(request).await {
            Some(version) => version,
            None => return UpdateOutcome::NoUpdate,
        };

        self.stage = Stage::Gate;
        match RolloutGate::new(&self.client).should_update(request, &target).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Skipping update to {} this cycle", target);
                return UpdateOutcome::Skipped { version: target };
            }
            Err(e) => return failed(Stage::Gate, e),
        }

        self.stage = Stage::Download;
        // Closed on every path out of this function
        let mut session = ProgressSession::open(&mut *self.progress);

        if let Err(e) = ensure_dir(request.temp_dir()).await {
            return failed(Stage::Download, e);
        }

        let downloader = Downloader::new(&self.client, &self.updater_name);
        let updater = match downloader.fetch(request, |percent| session.report(percent)).await {
            Ok(path) => path,
            Err(e) => return failed(Stage::Download, e),
        };

        self.stage = Stage::Launch;
        let spec = HandoffSpec::build(&updater, request, &target);
        if let Err(e) = self.launcher.launch(&spec) {
            return failed(Stage::Launch, e);
        }
        drop(session);

        info!("Handed off to updater for {}", target);
        UpdateOutcome::Launched {
            version: target,
            updater,
        }
    }
}

fn failed(stage: Stage, err: anyhow::Error) -> UpdateOutcome {
    let reason = format!("{err:#}");
    error!("Update {} stage failed: {}", stage, reason);
    UpdateOutcome::Failed { stage, reason }
}

/// Runs the whole pipeline with default settings.
///
/// Uses the default [`TriggerConfig`], no progress output and the detached launcher.
/// Returns `true` only if an updater process was started.
pub async fn check_and_launch(request: UpdateRequest) -> bool {
    match UpdateTrigger::new(request, &TriggerConfig::default()) {
        Ok(trigger) => trigger.run().await,
        Err(e) => {
            warn!("Update check unavailable: {e:#}");
            false
        }
    }
}
