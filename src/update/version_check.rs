use anyhow::{Context, Result};
use reqwest::StatusCode;
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::UpdateRequest;
use crate::update::client::UpdateClient;

/// The remote version descriptor, `{ "version": "1.2.0" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// The version currently published on the server.
    pub version: String,
}

impl VersionDescriptor {
    /// Parses the published version as semver.
    pub fn parse(&self) -> Result<Version> {
        parse_version(&self.version)
    }
}

/// Parses a semantic version, tolerating surrounding whitespace and a leading `v`.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).with_context(|| format!("Failed to parse version '{raw}'"))
}

/// Whether `remote` should replace `current`.
///
/// Only a strictly greater version qualifies. An equal version means there is
/// nothing to do, and a lower one means the server is stale or misconfigured;
/// both halt the pipeline.
pub fn is_newer(current: &Version, remote: &Version) -> bool {
    remote > current
}

/// Fetches the remote version descriptor.
///
/// Every failure mode (transport error, non-200 status, malformed JSON, non-semver
/// version) is logged and reported as `None`: from the caller's perspective an
/// unreachable server and an up-to-date installation look the same.
pub struct VersionResolver<'a> {
    client: &'a UpdateClient,
}

impl<'a> VersionResolver<'a> {
    pub fn new(client: &'a UpdateClient) -> Self {
        Self { client }
    }

    /// Fetches `{base_url}/{version_file_name}`.
    pub async fn resolve(&self, request: &UpdateRequest) -> Option<VersionDescriptor> {
        let url = request.url_for(request.version_file_name());

        let response = match self.client.get(request, request.version_file_name()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Version check failed: {e:#}");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            warn!("Version check against {} returned HTTP {}", url, response.status());
            return None;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read version descriptor from {}: {}", url, e);
                return None;
            }
        };

        let descriptor: VersionDescriptor = match serde_json::from_slice(&body) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Malformed version descriptor at {}: {}", url, e);
                return None;
            }
        };

        if let Err(e) = descriptor.parse() {
            warn!("Version descriptor at {} is not semver: {e:#}", url);
            return None;
        }

        debug!("Remote version: {}", descriptor.version);
        Some(descriptor)
    }

    /// Resolves the remote version and returns it only if it is newer than the
    /// running one.
    pub async fn newer_version(&self, request: &UpdateRequest) -> Option<Version> {
        let remote = self.resolve(request).await?.parse().ok()?;
        let current = request.current_version();

        if is_newer(current, &remote) {
            info!("Update available: {} -> {}", current, remote);
            Some(remote)
        } else if remote < *current {
            warn!("Server offers older version {} than running {}, ignoring", remote, current);
            None
        } else {
            debug!("Already on latest version {}", current);
            None
        }
    }
}
