use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;
use update_trigger::test_utils::MockUpdateServer;

const ENV_VARS: &[&str] = &[
    "RUST_LOG",
    "UPDATE_TRIGGER_BASE_URL",
    "UPDATE_TRIGGER_CURRENT_VERSION",
    "UPDATE_TRIGGER_VERSION_FILE",
    "UPDATE_TRIGGER_TEMP_DIR",
    "UPDATE_TRIGGER_CACHE_DIR",
    "UPDATE_TRIGGER_EXEC",
    "UPDATE_TRIGGER_CWD",
    "UPDATE_TRIGGER_APP_DIR",
    "UPDATE_TRIGGER_WAIT_PID",
    "UPDATE_TRIGGER_VERBOSE",
    "UPDATE_TRIGGER_QUIET",
];

/// A command isolated from the caller's environment and user config.
fn trigger_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("update-trigger").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("UPDATE_TRIGGER_CONFIG", home.join("absent.toml"))
        .env("UPDATE_TRIGGER_NO_PROGRESS", "1")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0");
    cmd
}

/// Runs `cmd` off the async runtime so the mock server keeps serving.
async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert()).await.unwrap()
}

fn base_args(home: &Path, server_url: &str, current: &str) -> Vec<String> {
    vec![
        "--base-url".to_string(),
        server_url.to_string(),
        "--current-version".to_string(),
        current.to_string(),
        "--exec".to_string(),
        home.join("app").display().to_string(),
        "--cwd".to_string(),
        home.display().to_string(),
        "--temp-dir".to_string(),
        home.join("tmp").display().to_string(),
        "--cache-dir".to_string(),
        home.join("cache").display().to_string(),
    ]
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--wait-pid"))
        .stdout(predicate::str::contains("--base-url"));
}

#[test]
fn test_missing_required_arguments_exit_2() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .args(["--base-url", "http://127.0.0.1:9"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--current-version"));
}

#[test]
fn test_missing_base_url_exit_2() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .args(["--current-version", "1.0.0", "--exec", "/opt/app/app"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("base URL"));
}

#[test]
fn test_invalid_version_exit_2() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .args(["--base-url", "http://127.0.0.1:9"])
        .args(["--current-version", "yesterday", "--exec", "/opt/app/app"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("yesterday"));
}

#[test]
fn test_missing_explicit_config_exit_2() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .args(["--current-version", "1.0.0", "--exec", "/opt/app/app"])
        .arg("--config")
        .arg(home.path().join("nope.toml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_unusable_http_client_exit_1() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("config.toml");
    std::fs::write(&config, "user_agent = \"bad\\nagent\"\n").unwrap();

    trigger_cmd(home.path())
        .args(base_args(home.path(), "http://127.0.0.1:9", "1.0.0"))
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("building HTTP client"));
}

#[test]
fn test_unreachable_server_exit_1() {
    let home = TempDir::new().unwrap();
    trigger_cmd(home.path())
        .args(base_args(home.path(), "http://127.0.0.1:9", "1.0.0"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No update available"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_up_to_date_exit_1() -> Result<()> {
    let home = TempDir::new()?;
    let server = MockUpdateServer::start().await;
    server.route_json("/version.json", r#"{"version":"1.0.0"}"#);

    let mut cmd = trigger_cmd(home.path());
    cmd.args(base_args(home.path(), &server.url(), "1.0.0"));
    run(cmd).await.code(1);

    assert_eq!(server.requests(), vec!["/version.json"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_base_url_from_config_file() -> Result<()> {
    let home = TempDir::new()?;
    let server = MockUpdateServer::start().await;
    server.route_json("/stable.json", r#"{"version":"1.0.0"}"#);

    let config = home.path().join("config.toml");
    std::fs::write(
        &config,
        format!("base_url = \"{}\"\nversion_file = \"stable.json\"\n", server.url()),
    )?;

    let mut cmd = trigger_cmd(home.path());
    cmd.args(["--current-version", "1.0.0", "--exec", "/opt/app/app", "-q"])
        .arg("--config")
        .arg(&config);
    run(cmd).await.code(1).stdout(predicate::str::is_empty());

    assert_eq!(server.requests(), vec!["/stable.json"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_skipped_rollout_exit_1() -> Result<()> {
    let home = TempDir::new()?;
    let server = MockUpdateServer::start().await;
    server.route_json("/version.json", r#"{"version":"1.2.0"}"#);
    server.route_json("/1.2.0.chance", r#"{"chance":0}"#);

    let mut cmd = trigger_cmd(home.path());
    cmd.args(base_args(home.path(), &server.url(), "1.0.0"));
    run(cmd).await.code(1).stdout(predicate::str::contains("1.2.0"));

    assert!(home.path().join("cache").join("rolls").join("1.2.0").exists());
    assert!(!server.requests().contains(&"/latest-updater".to_string()));
    Ok(())
}

/// The real detached launcher starts the downloaded updater with the handoff arguments.
#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_full_handoff_exit_0() -> Result<()> {
    let home = TempDir::new()?;
    let server = MockUpdateServer::start().await;
    server.route_json("/version.json", r#"{"version":"1.2.0"}"#);
    server.route_bytes(
        "/latest-updater",
        b"#!/bin/sh\nprintf '%s\\n' \"$@\" > handoff-args.tmp\nmv handoff-args.tmp handoff-args\n"
            .to_vec(),
    );

    let mut cmd = trigger_cmd(home.path());
    cmd.args(base_args(home.path(), &server.url(), "1.0.0"))
        .args(["--wait-pid", "111", "--wait-pid", "222"]);
    run(cmd).await.success().stdout(predicate::str::contains("Launched"));

    // The updater writes its arguments from the temp dir it was started in
    let marker = home.path().join("tmp").join("handoff-args");
    let mut waited = 0;
    while !marker.exists() && waited < 100 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        waited += 1;
    }

    let args = std::fs::read_to_string(&marker)?;
    let args: Vec<&str> = args.lines().collect();
    let exec = home.path().join("app").display().to_string();
    let cwd = home.path().display().to_string();
    let url = server.url();
    assert_eq!(
        args,
        vec![
            "--base-url",
            url.as_str(),
            "--version",
            "1.2.0",
            "--exec",
            exec.as_str(),
            "--cwd",
            cwd.as_str(),
            "--app-dir",
            cwd.as_str(),
            "--force-temp",
            "-p",
            "111",
            "-p",
            "222",
        ]
    );
    Ok(())
}
