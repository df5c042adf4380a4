// Unconditional stop / grace / start of the managed group

use crate::error::ProcessControlError;
use crate::recycle::GroupController;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Completion record of one recycle cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RecycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop: Result<(), ProcessControlError>,
    pub start: Result<(), ProcessControlError>,
}

impl RecycleReport {
    pub fn succeeded(&self) -> bool {
        self.stop.is_ok() && self.start.is_ok()
    }
}

pub struct Recycler {
    group: Box<dyn GroupController>,
    grace: Duration,
}

impl Recycler {
    pub fn new(group: Box<dyn GroupController>, grace: Duration) -> Self {
        Self { group, grace }
    }

    /// Stop, wait out the grace interval, start. Start is attempted even
    /// when stop failed. Failures are logged, never returned.
    pub async fn run_recycle_cycle(&self) -> RecycleReport {
        let started_at = Utc::now();
        let group = self.group.describe();
        tracing::info!("Recycling {}", group);

        let stop = self.group.stop().await;
        if let Err(e) = &stop {
            tracing::error!("Stop of {} failed, attempting start anyway: {}", group, e);
        }

        tracing::debug!("Waiting {:?} for {} to drain", self.grace, group);
        tokio::time::sleep(self.grace).await;

        let start = self.group.start().await;
        if let Err(e) = &start {
            tracing::error!("Start of {} failed: {}", group, e);
        }

        let report = RecycleReport {
            started_at,
            finished_at: Utc::now(),
            stop,
            start,
        };

        tracing::info!(
            started_at = %report.started_at.to_rfc3339(),
            finished_at = %report.finished_at.to_rfc3339(),
            stop_ok = report.stop.is_ok(),
            start_ok = report.start.is_ok(),
            "Recycle cycle for {} completed",
            group
        );

        report
    }
}
