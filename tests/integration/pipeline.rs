use anyhow::Result;
use semver::Version;
use tempfile::TempDir;
use update_trigger::config::{TriggerConfig, UpdateRequest};
use update_trigger::test_utils::{
    MockUpdateServer, ProgressEvent, RecordingLauncher, RecordingProgress, init_test_logging,
};
use update_trigger::update::{RollCache, Stage, UpdateClient, UpdateOutcome, UpdateTrigger};

const UPDATER: &str = "latest-updater";

/// A server plus isolated temp and cache directories for one installation.
struct Installation {
    server: MockUpdateServer,
    temp: TempDir,
    cache: TempDir,
}

impl Installation {
    async fn new() -> Result<Self> {
        init_test_logging(None);
        Ok(Self {
            server: MockUpdateServer::start().await,
            temp: TempDir::new()?,
            cache: TempDir::new()?,
        })
    }

    fn request(&self, current: &str) -> Result<UpdateRequest> {
        Ok(UpdateRequest::builder()
            .base_url(format!("{}/", self.server.url()))
            .current_version(current)
            .exec_path("/Applications/My App/app")
            .cwd("/Users/someone/My Documents")
            .temp_dir(self.temp.path())
            .cache_dir(self.cache.path())
            .wait_pid(4242)
            .build()?)
    }

    fn trigger(&self, current: &str, launcher: &RecordingLauncher) -> Result<UpdateTrigger> {
        let client = UpdateClient::new(&TriggerConfig::default())?;
        Ok(UpdateTrigger::with_client(self.request(current)?, client, UPDATER)
            .launcher(launcher.clone()))
    }

    fn publish(&self, version: &str) {
        self.server
            .route_json("/version.json", &format!(r#"{{"version":"{version}"}}"#));
    }

    fn publish_chance(&self, version: &str, chance: i64) {
        self.server
            .route_json(&format!("/{version}.chance"), &format!(r#"{{"chance":{chance}}}"#));
    }

    fn rolls(&self) -> RollCache {
        RollCache::new(self.cache.path())
    }
}

/// A newer version without a chance file is downloaded and handed off.
#[tokio::test]
async fn test_ungated_update_launches() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.2.0");
    let binary = b"\x7fELF pretend updater".to_vec();
    install.server.route_bytes("/latest-updater", binary.clone());

    let launcher = RecordingLauncher::new();
    let progress = RecordingProgress::new();
    let launched = install.trigger("1.0.0", &launcher)?.progress(progress.clone()).run().await;

    assert!(launched);
    let updater = install.temp.path().join(UPDATER);
    assert_eq!(tokio::fs::read(&updater).await?, binary);

    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    let args: Vec<String> =
        launches[0].args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
    assert_eq!(
        args,
        vec![
            "--base-url".to_string(),
            install.server.url(),
            "--version".to_string(),
            "1.2.0".to_string(),
            "--exec".to_string(),
            "/Applications/My App/app".to_string(),
            "--cwd".to_string(),
            "/Users/someone/My Documents".to_string(),
            "--app-dir".to_string(),
            "/Applications/My App".to_string(),
            "--force-temp".to_string(),
            "-p".to_string(),
            "4242".to_string(),
        ]
    );
    assert_eq!(progress.events().first(), Some(&ProgressEvent::Open));
    assert_eq!(progress.events().last(), Some(&ProgressEvent::Close));

    Ok(())
}

/// A losing roll skips this cycle; raising the chance later admits the same roll.
#[tokio::test]
async fn test_staged_rollout_admits_roll_when_chance_rises() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.2.0");
    install.publish_chance("1.2.0", 30);
    install.server.route_bytes("/latest-updater", b"updater".to_vec());
    install.rolls().store(&Version::new(1, 2, 0), 45).await?;

    let launcher = RecordingLauncher::new();
    let outcome = install.trigger("1.0.0", &launcher)?.execute().await;
    assert_eq!(
        outcome,
        UpdateOutcome::Skipped {
            version: Version::new(1, 2, 0)
        }
    );
    assert!(launcher.launches().is_empty());
    assert!(!install.temp.path().join(UPDATER).exists());

    install.publish_chance("1.2.0", 50);
    assert!(install.trigger("1.0.0", &launcher)?.run().await);
    assert_eq!(launcher.launches().len(), 1);
    assert_eq!(install.rolls().load(&Version::new(1, 2, 0)).await, Some(45));

    Ok(())
}

/// Same or older remote versions stop after the version check.
#[tokio::test]
async fn test_no_newer_version() -> Result<()> {
    let install = Installation::new().await?;
    let launcher = RecordingLauncher::new();

    install.publish("1.2.0");
    assert!(!install.trigger("1.2.0", &launcher)?.run().await);

    install.publish("1.1.9");
    assert!(!install.trigger("1.2.0", &launcher)?.run().await);

    assert_eq!(install.server.requests(), vec!["/version.json", "/version.json"]);
    assert!(launcher.launches().is_empty());

    Ok(())
}

/// Version endpoint trouble is indistinguishable from being up to date.
#[tokio::test]
async fn test_version_endpoint_failures_mean_no_update() -> Result<()> {
    let install = Installation::new().await?;
    let launcher = RecordingLauncher::new();

    install.server.route_status("/version.json", 500);
    assert_eq!(install.trigger("1.0.0", &launcher)?.execute().await, UpdateOutcome::NoUpdate);

    install.server.route_json("/version.json", "<html>maintenance</html>");
    assert_eq!(install.trigger("1.0.0", &launcher)?.execute().await, UpdateOutcome::NoUpdate);

    install.server.route_json("/version.json", r#"{"version":"soon"}"#);
    assert_eq!(install.trigger("1.0.0", &launcher)?.execute().await, UpdateOutcome::NoUpdate);

    assert!(launcher.launches().is_empty());
    Ok(())
}

/// Chance 0 admits nobody and chance 100 admits everybody.
#[tokio::test]
async fn test_chance_extremes() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("2.0.0");
    install.server.route_bytes("/latest-updater", b"updater".to_vec());
    let launcher = RecordingLauncher::new();

    install.publish_chance("2.0.0", 0);
    for roll in [1, 50, 100] {
        install.rolls().store(&Version::new(2, 0, 0), roll).await?;
        assert!(!install.trigger("1.0.0", &launcher)?.run().await, "roll {roll}");
    }

    install.publish_chance("2.0.0", 100);
    for roll in [1, 50, 100] {
        install.rolls().store(&Version::new(2, 0, 0), roll).await?;
        assert!(install.trigger("1.0.0", &launcher)?.run().await, "roll {roll}");
    }

    assert_eq!(launcher.launches().len(), 3);
    Ok(())
}

/// A drawn roll is persisted once and every later run reaches the same decision.
#[tokio::test]
async fn test_roll_is_drawn_once() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.5.0");
    install.publish_chance("1.5.0", 50);
    install.server.route_bytes("/latest-updater", b"updater".to_vec());
    let launcher = RecordingLauncher::new();

    assert_eq!(install.rolls().load(&Version::new(1, 5, 0)).await, None);
    let first = install.trigger("1.0.0", &launcher)?.run().await;
    let roll = install.rolls().load(&Version::new(1, 5, 0)).await;
    assert!(roll.is_some());

    for _ in 0..5 {
        assert_eq!(install.trigger("1.0.0", &launcher)?.run().await, first);
        assert_eq!(install.rolls().load(&Version::new(1, 5, 0)).await, roll);
    }
    Ok(())
}

/// A failed download is contained and leaves nothing behind.
#[tokio::test]
async fn test_download_failure_is_contained() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.2.0");
    install.server.route_status("/latest-updater", 404);
    let launcher = RecordingLauncher::new();

    let outcome = install.trigger("1.0.0", &launcher)?.execute().await;

    assert!(matches!(
        outcome,
        UpdateOutcome::Failed {
            stage: Stage::Download,
            ..
        }
    ));
    assert!(launcher.launches().is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(install.temp.path())?.collect();
    assert!(leftovers.is_empty(), "temp dir not empty: {leftovers:?}");
    Ok(())
}

/// An updater endpoint that goes silent fails the download instead of hanging the host.
#[tokio::test]
async fn test_silent_download_times_out() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.2.0");
    install.server.route_stall("/latest-updater");
    let config = TriggerConfig {
        read_timeout_secs: 1,
        ..TriggerConfig::default()
    };
    let client = UpdateClient::new(&config)?;
    let launcher = RecordingLauncher::new();
    let mut trigger = UpdateTrigger::with_client(install.request("1.0.0")?, client, UPDATER)
        .launcher(launcher.clone());

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(10), trigger.execute())
        .await
        .expect("pipeline must give up on a silent server");

    assert!(matches!(
        outcome,
        UpdateOutcome::Failed {
            stage: Stage::Download,
            ..
        }
    ));
    assert!(launcher.launches().is_empty());
    Ok(())
}

/// A body cut short by the server is a download failure, not a launch.
#[tokio::test]
async fn test_truncated_download_is_not_launched() -> Result<()> {
    let install = Installation::new().await?;
    install.publish("1.2.0");
    install
        .server
        .route_truncated("/latest-updater", vec![0u8; 1024], 1024 * 1024);
    let launcher = RecordingLauncher::new();

    assert!(!install.trigger("1.0.0", &launcher)?.run().await);
    assert!(launcher.launches().is_empty());
    assert!(!install.temp.path().join(UPDATER).exists());
    Ok(())
}

/// The updater name and version file are configurable.
#[tokio::test]
async fn test_custom_names() -> Result<()> {
    let install = Installation::new().await?;
    install
        .server
        .route_json("/beta.json", r#"{"version":"v3.0.0-beta.1"}"#);
    install.server.route_bytes("/updater-beta", b"beta".to_vec());

    let request = UpdateRequest::builder()
        .base_url(install.server.url())
        .current_version("2.9.0")
        .version_file_name("beta.json")
        .exec_path("/opt/app/app")
        .cwd("/opt/app")
        .temp_dir(install.temp.path())
        .cache_dir(install.cache.path())
        .build()?;
    let config = TriggerConfig {
        updater_name: Some("updater-beta".to_string()),
        ..TriggerConfig::default()
    };
    let launcher = RecordingLauncher::new();

    let outcome = UpdateTrigger::new(request, &config)?
        .launcher(launcher.clone())
        .execute()
        .await;

    assert_eq!(
        outcome,
        UpdateOutcome::Launched {
            version: Version::parse("3.0.0-beta.1")?,
            updater: install.temp.path().join("updater-beta"),
        }
    );
    assert_eq!(
        install.server.requests(),
        vec!["/beta.json", "/3.0.0-beta.1.chance", "/updater-beta"]
    );
    Ok(())
}
