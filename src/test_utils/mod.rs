//! Test utilities for update-trigger
//!
//! This module provides the fixtures the unit and integration tests share:
//! - [`MockUpdateServer`], a loopback HTTP server serving canned update endpoints
//! - [`RecordingLauncher`], a [`Launcher`] that records handoffs instead of spawning
//! - [`RecordingProgress`], a [`ProgressSink`] that records every call
//!
//! # Example
//!
//! ```rust,no_run
//! use update_trigger::test_utils::MockUpdateServer;
//!
//! # async fn example() {
//! let server = MockUpdateServer::start().await;
//! server.route_json("/version.json", r#"{"version":"1.2.0"}"#);
//! // point an UpdateRequest at server.url()
//! # }
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::TriggerError;
use crate::update::handoff::{HandoffSpec, Launcher};
use crate::update::progress::ProgressSink;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` if given, otherwise `RUST_LOG`
/// if set, otherwise leaves logging off.
///
/// ```bash
/// RUST_LOG=update_trigger=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

#[derive(Debug, Clone)]
enum Route {
    Status(u16),
    /// Reads the request and then never answers.
    Stall,
    Body {
        content_type: &'static str,
        body: Vec<u8>,
        /// `None` omits `Content-Length` and ends the body by closing the connection.
        advertised_len: Option<usize>,
    },
}

type Routes = Arc<Mutex<HashMap<String, Route>>>;

/// A minimal HTTP/1.1 server on `127.0.0.1` with per-path canned responses.
///
/// Unrouted paths answer `404`. Every connection serves one request and is then
/// closed. Routes can be replaced while the server runs. The accept loop stops when
/// the server is dropped.
pub struct MockUpdateServer {
    url: String,
    routes: Routes,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl MockUpdateServer {
    /// Binds an ephemeral port and starts serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let routes: Routes = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let task = {
            let routes = routes.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let _ = serve(stream, &routes, &requests).await;
                    });
                }
            })
        };

        Self {
            url: format!("http://{addr}"),
            routes,
            requests,
            task,
        }
    }

    /// Base URL of the server, without trailing slash.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    /// Serves `body` as `application/json` with status 200.
    pub fn route_json(&self, path: &str, body: &str) {
        self.route(
            path,
            Route::Body {
                content_type: "application/json",
                advertised_len: Some(body.len()),
                body: body.as_bytes().to_vec(),
            },
        );
    }

    /// Answers with `status` and an empty body.
    pub fn route_status(&self, path: &str, status: u16) {
        self.route(path, Route::Status(status));
    }

    /// Accepts the request and holds the connection open without ever responding.
    pub fn route_stall(&self, path: &str) {
        self.route(path, Route::Stall);
    }

    /// Serves binary content with a correct `Content-Length`.
    pub fn route_bytes(&self, path: &str, body: Vec<u8>) {
        self.route(
            path,
            Route::Body {
                content_type: "application/octet-stream",
                advertised_len: Some(body.len()),
                body,
            },
        );
    }

    /// Serves binary content without `Content-Length`.
    pub fn route_bytes_unknown_length(&self, path: &str, body: Vec<u8>) {
        self.route(
            path,
            Route::Body {
                content_type: "application/octet-stream",
                advertised_len: None,
                body,
            },
        );
    }

    /// Advertises `advertised_len` bytes but sends only `body` before hanging up.
    pub fn route_truncated(&self, path: &str, body: Vec<u8>, advertised_len: usize) {
        self.route(
            path,
            Route::Body {
                content_type: "application/octet-stream",
                advertised_len: Some(advertised_len),
                body,
            },
        );
    }

    /// Paths requested so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockUpdateServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: &Routes,
    requests: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    requests.lock().unwrap().push(path.clone());

    let route = routes.lock().unwrap().get(&path).cloned();
    let (status, content_type, body, advertised_len) = match route {
        // 204 carries no body and no length
        Some(Route::Status(status)) => {
            (status, "text/plain", Vec::new(), (status != 204).then_some(0))
        }
        Some(Route::Stall) => {
            std::future::pending::<()>().await;
            return Ok(());
        }
        Some(Route::Body {
            content_type,
            body,
            advertised_len,
        }) => (200, content_type, body, advertised_len),
        None => (404, "text/plain", Vec::new(), Some(0)),
    };

    let mut response =
        format!("HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\n", reason(status));
    if let Some(len) = advertised_len {
        response.push_str(&format!("Content-Length: {len}\r\n"));
    }
    response.push_str("Connection: close\r\n\r\n");

    stream.write_all(response.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// What [`RecordingLauncher`] does after recording a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaunchBehavior {
    Succeed,
    Fail,
    Panic,
}

/// A launcher that records each [`HandoffSpec`] instead of spawning it.
///
/// Clones share the same record, so a test can keep one clone and hand the other to
/// the pipeline.
#[derive(Debug, Clone)]
pub struct RecordingLauncher {
    launches: Arc<Mutex<Vec<HandoffSpec>>>,
    behavior: LaunchBehavior,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::with_behavior(LaunchBehavior::Succeed)
    }

    /// Records, then fails like an updater that cannot be started.
    pub fn failing() -> Self {
        Self::with_behavior(LaunchBehavior::Fail)
    }

    /// Records, then panics.
    pub fn panicking() -> Self {
        Self::with_behavior(LaunchBehavior::Panic)
    }

    fn with_behavior(behavior: LaunchBehavior) -> Self {
        Self {
            launches: Arc::default(),
            behavior,
        }
    }

    /// Handoffs attempted so far.
    pub fn launches(&self) -> Vec<HandoffSpec> {
        self.launches.lock().unwrap().clone()
    }
}

impl Default for RecordingLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, spec: &HandoffSpec) -> Result<()> {
        self.launches.lock().unwrap().push(spec.clone());
        match self.behavior {
            LaunchBehavior::Succeed => Ok(()),
            LaunchBehavior::Fail => Err(TriggerError::SpawnFailed {
                program: spec.program().display().to_string(),
                reason: "permission denied".to_string(),
            }
            .into()),
            LaunchBehavior::Panic => panic!("launcher exploded"),
        }
    }
}

/// A call observed by [`RecordingProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Open,
    Report(u8),
    Close,
}

/// A progress sink that records every call. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
    fail_open: bool,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `open` fails, like a progress window that cannot be shown.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Only the reported percentages, in order.
    pub fn reports(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Report(percent) => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn open(&mut self) -> Result<()> {
        self.events.lock().unwrap().push(ProgressEvent::Open);
        if self.fail_open {
            anyhow::bail!("no display available");
        }
        Ok(())
    }

    fn report(&mut self, percent: u8) {
        self.events.lock().unwrap().push(ProgressEvent::Report(percent));
    }

    fn close(&mut self) {
        self.events.lock().unwrap().push(ProgressEvent::Close);
    }
}
