use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, LocalInstant};
use crate::decision::{AccessDecision, AccessEngine};
use crate::error::{AccessError, Result};

/// Dashboard summary for one kid profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KidStatus {
    pub kid_profile_id: String,
    pub kid_name: String,
    pub decision: AccessDecision,
}

/// Batch access evaluation over all kid profiles of a parent
pub struct FleetReporter {
    engine: Arc<AccessEngine>,
}

impl FleetReporter {
    pub fn new(engine: Arc<AccessEngine>) -> Self {
        Self { engine }
    }

    /// One decision per kid owned by `parent_id`, in profile order
    ///
    /// Every kid is evaluated against the same instant, so a fleet report
    /// never straddles a day boundary.
    pub async fn get_fleet_status(&self, parent_id: &str) -> Result<Vec<KidStatus>> {
        let directory = self.engine.directory();

        let tz = directory
            .account_timezone(parent_id)
            .await?
            .ok_or_else(|| AccessError::parent_not_found(parent_id))?;
        let now = LocalInstant::at(self.engine.clock().now(), tz);

        let profiles = directory.list_profiles(parent_id).await?;
        let mut statuses = Vec::with_capacity(profiles.len());

        for profile in profiles {
            let decision = self.engine.evaluate_policy(&profile, &now).await?;
            statuses.push(KidStatus {
                kid_profile_id: profile.id,
                kid_name: profile.name,
                decision,
            });
        }

        debug!("Fleet status for {}: {} kids", parent_id, statuses.len());
        Ok(statuses)
    }
}
