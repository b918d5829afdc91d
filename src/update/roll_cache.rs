//! Persisted per-version rollout rolls.
//!
//! A roll is drawn once per target version and stored as plain text at
//! `{cache_dir}/rolls/{version}`. Every later run for the same version reuses it, so
//! an installation does not get a fresh chance each launch and a server-side change
//! of the chance value moves the eligibility threshold without re-rolling anyone.
//!
//! Concurrent launches are not synchronized; the last writer wins.

use anyhow::Result;
use semver::Version;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::core::TriggerError;
use crate::utils::fs::atomic_write;

/// Valid roll values. `0` is reserved for "no prior roll".
pub const ROLL_RANGE: RangeInclusive<u8> = 1..=100;

/// Draws a fresh uniformly distributed roll in [`ROLL_RANGE`].
pub fn draw_roll() -> u8 {
    rand::random_range(ROLL_RANGE)
}

/// Parses a stored roll, rejecting anything outside [`ROLL_RANGE`].
pub fn parse_roll(content: &str) -> Option<u8> {
    content.trim().parse::<u8>().ok().filter(|roll| ROLL_RANGE.contains(roll))
}

/// The roll cache directory for one installation.
#[derive(Debug, Clone)]
pub struct RollCache {
    dir: PathBuf,
}

impl RollCache {
    /// Opens the cache under `{cache_dir}/rolls`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join("rolls"),
        }
    }

    /// Location of the record for `version`.
    pub fn roll_path(&self, version: &Version) -> PathBuf {
        self.dir.join(version.to_string())
    }

    /// Reads the stored roll for `version`.
    ///
    /// Missing, unreadable and corrupt records all yield `None`.
    pub async fn load(&self, version: &Version) -> Option<u8> {
        let path = self.roll_path(version);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No roll cached for {} ({})", version, e);
                return None;
            }
        };

        let roll = parse_roll(&content);
        if roll.is_none() {
            warn!("Ignoring invalid roll record at {}: {:?}", path.display(), content.trim());
        }
        roll
    }

    /// Persists `roll` for `version`, creating the cache directory as needed.
    pub async fn store(&self, version: &Version, roll: u8) -> Result<()> {
        let path = self.roll_path(version);
        atomic_write(&path, roll.to_string().as_bytes()).await.map_err(|e| {
            e.context(TriggerError::FileSystem {
                operation: "writing roll record".to_string(),
                path: path.display().to_string(),
            })
        })
    }

    /// Returns the cached roll for `version`, drawing and persisting a new one if
    /// none is cached.
    ///
    /// The new roll is on disk before this returns.
    pub async fn get_or_draw(&self, version: &Version) -> Result<u8> {
        if let Some(roll) = self.load(version).await {
            debug!("Reusing roll {} for {}", roll, version);
            return Ok(roll);
        }

        let roll = draw_roll();
        self.store(version, roll).await?;
        debug!("Drew roll {} for {}", roll, version);
        Ok(roll)
    }
}
