//! Staged rollout gate.
//!
//! The server may publish `{base_url}/{version}.chance` containing
//! `{ "chance": <0..=100> }`, the percentage of installations allowed to update to
//! `version` this cycle. Each installation compares its persisted roll (see
//! [`RollCache`]) against that percentage.
//!
//! | chance endpoint | decision |
//! |-----------------|----------|
//! | non-200 | eligible (no gating configured) |
//! | unreachable or body unreadable | not eligible this cycle |
//! | 200, malformed body | not eligible this cycle |
//! | 200, `chance` | `roll <= chance` |

use anyhow::Result;
use reqwest::StatusCode;
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::UpdateRequest;
use crate::update::client::UpdateClient;
use crate::update::roll_cache::RollCache;

/// The chance descriptor, `{ "chance": 30 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChanceDescriptor {
    /// Percentage of installations eligible this cycle.
    pub chance: i64,
}

impl ChanceDescriptor {
    /// The chance clamped into `0..=100`.
    pub fn percent(&self) -> u8 {
        // Lossless after the clamp
        self.chance.clamp(0, 100) as u8
    }
}

/// Name of the chance file for `version`.
pub fn chance_file_name(version: &Version) -> String {
    format!("{version}.chance")
}

/// Whether a roll falls inside the eligible percentage. The boundary is inclusive.
pub fn is_eligible(roll: u8, chance: u8) -> bool {
    roll <= chance
}

/// Decides whether this installation takes the update this cycle.
pub struct RolloutGate<'a> {
    client: &'a UpdateClient,
}

impl<'a> RolloutGate<'a> {
    pub fn new(client: &'a UpdateClient) -> Self {
        Self { client }
    }

    /// Fetches the chance for `target` and consults the roll cache.
    ///
    /// # Errors
    ///
    /// Only a failure to persist a freshly drawn roll is an error. Network trouble
    /// and malformed chance files resolve to `Ok(false)`.
    pub async fn should_update(&self, request: &UpdateRequest, target: &Version) -> Result<bool> {
        let name = chance_file_name(target);

        let response = match self.client.get(request, &name).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Chance check for {} failed, skipping this cycle: {e:#}", target);
                return Ok(false);
            }
        };

        if response.status() != StatusCode::OK {
            debug!("No chance file for {} (HTTP {}), rollout is not staged", target, response.status());
            return Ok(true);
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Chance file for {} could not be read, skipping this cycle: {}", target, e);
                return Ok(false);
            }
        };

        let chance = match serde_json::from_slice::<ChanceDescriptor>(&body) {
            Ok(descriptor) => descriptor.percent(),
            Err(e) => {
                warn!("Malformed chance file for {}, skipping this cycle: {}", target, e);
                return Ok(false);
            }
        };

        let roll = RollCache::new(request.cache_dir()).get_or_draw(target).await?;
        let eligible = is_eligible(roll, chance);

        if eligible {
            info!("Rollout of {} at {}%: roll {} is eligible", target, chance, roll);
        } else {
            info!("Rollout of {} at {}%: roll {} is not eligible yet", target, chance, roll);
        }
        Ok(eligible)
    }
}
